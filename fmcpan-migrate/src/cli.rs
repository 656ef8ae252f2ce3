use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "fmcpan-migrate")]
#[command(about = "Migrate firewall objects and policies between management platforms")]
pub struct Cli {
    /// Project file holding devices and mappings.
    #[arg(long, global = true, default_value = "project.toml")]
    pub project: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Create a new project file.
    Init(InitArgs),
    /// Define a security device in the project.
    AddDevice(AddDeviceArgs),
    /// Select the migration source device.
    SetSource(SetDeviceArgs),
    /// Select the migration target device.
    SetTarget(SetDeviceArgs),
    /// Map a source container name to a target container name.
    MapContainer(MapArgs),
    /// Map a source zone name to a target zone name.
    MapZone(MapArgs),
    /// Extract the source device's export into the canonical schema and report.
    Extract(ExtractArgs),
    /// Migrate a named policy container to the target platform.
    Migrate(MigrateArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Project name.
    #[arg(long, default_value = "migration")]
    pub name: String,
}

#[derive(Parser, Debug)]
pub struct AddDeviceArgs {
    /// Device name within the project.
    pub name: String,
    /// Platform flavor: fmc or panorama.
    #[arg(long)]
    pub platform: String,
    /// Device UID; defaults to the device name.
    #[arg(long)]
    pub uid: Option<String>,
    /// Path of the device's JSON export.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SetDeviceArgs {
    pub name: String,
}

#[derive(Parser, Debug)]
pub struct MapArgs {
    pub source: String,
    pub target: String,
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Source security-policy container to migrate.
    pub container: String,
    /// Also migrate the NAT-policy container of the same name.
    #[arg(long)]
    pub with_nat: bool,
    /// Write the recorded target creation calls to a JSON file.
    #[arg(long)]
    pub out: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
