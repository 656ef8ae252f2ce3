use std::fs;

use anyhow::{bail, Context, Result};
use canon_store::{Store, Uid};
use clap::Parser;
use fmcpan_migrate::connector::{FileSource, Recorder};
use fmcpan_migrate::extract::extract_all;
use fmcpan_migrate::migrate::{migrate_container, render_migration_text, MigrateOptions};
use fmcpan_migrate::project::{DeviceEntry, Project};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{
    AddDeviceArgs, Cli, Command, ExtractArgs, InitArgs, MapArgs, MigrateArgs, OutputFormat,
    SetDeviceArgs,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Init(args) => run_init(&cli.project, args),
        Command::AddDevice(args) => run_add_device(&cli.project, args),
        Command::SetSource(args) => run_set_device(&cli.project, args, true),
        Command::SetTarget(args) => run_set_device(&cli.project, args, false),
        Command::MapContainer(args) => run_map(&cli.project, args, true),
        Command::MapZone(args) => run_map(&cli.project, args, false),
        Command::Extract(args) => run_extract(&cli.project, args),
        Command::Migrate(args) => run_migrate(&cli.project, args),
    }
}

fn load_project(path: &std::path::Path) -> Result<Project> {
    Project::load(path).with_context(|| format!("cannot load project {}", path.display()))
}

fn run_init(path: &std::path::Path, args: InitArgs) -> Result<()> {
    if path.exists() {
        bail!("project file {} already exists", path.display());
    }
    let project = Project {
        name: args.name,
        ..Project::default()
    };
    project.save(path)?;
    println!("created project {}", path.display());
    Ok(())
}

fn run_add_device(path: &std::path::Path, args: AddDeviceArgs) -> Result<()> {
    let mut project = load_project(path)?;
    let uid = args.uid.unwrap_or_else(|| args.name.clone());
    project.devices.insert(
        args.name.clone(),
        DeviceEntry {
            uid,
            platform: args.platform,
            export: args.export,
        },
    );
    project.save(path)?;
    println!("device {} added", args.name);
    Ok(())
}

fn run_set_device(path: &std::path::Path, args: SetDeviceArgs, source: bool) -> Result<()> {
    let mut project = load_project(path)?;
    if !project.devices.contains_key(&args.name) {
        bail!("device '{}' is not defined in the project", args.name);
    }
    let role = if source {
        project.source = Some(args.name.clone());
        "source"
    } else {
        project.target = Some(args.name.clone());
        "target"
    };
    project.save(path)?;
    println!("{role} set to {}", args.name);
    Ok(())
}

fn run_map(path: &std::path::Path, args: MapArgs, container: bool) -> Result<()> {
    let mut project = load_project(path)?;
    let kind = if container {
        project
            .container_map
            .insert(args.source.clone(), args.target.clone());
        "container"
    } else {
        project
            .zone_map
            .insert(args.source.clone(), args.target.clone());
        "zone"
    };
    project.save(path)?;
    println!("mapped {kind} {} -> {}", args.source, args.target);
    Ok(())
}

fn source_store(project: &Project) -> Result<(Store, Uid)> {
    let (name, entry) = project.source_device()?;
    let export = entry
        .export
        .as_ref()
        .with_context(|| format!("device '{name}' has no export path"))?;
    let connector = FileSource::load(export)
        .with_context(|| format!("cannot load export for device '{name}'"))?;
    let mut store = Store::new();
    let device_uid = Uid::new(entry.uid.clone());
    extract_all(&mut store, &connector, &device_uid)
        .with_context(|| format!("extraction failed for device '{name}'"))?;
    Ok((store, device_uid))
}

fn run_extract(path: &std::path::Path, args: ExtractArgs) -> Result<()> {
    let project = load_project(path)?;
    let (name, entry) = project.source_device()?;
    let export = entry
        .export
        .as_ref()
        .with_context(|| format!("device '{name}' has no export path"))?;
    let connector = FileSource::load(export)
        .with_context(|| format!("cannot load export for device '{name}'"))?;
    let mut store = Store::new();
    let report = extract_all(&mut store, &connector, &Uid::new(entry.uid.clone()))
        .with_context(|| format!("extraction failed for device '{name}'"))?;
    match args.format {
        OutputFormat::Text => println!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn run_migrate(path: &std::path::Path, args: MigrateArgs) -> Result<()> {
    let project = load_project(path)?;
    let (store, device_uid) = source_store(&project)?;

    let opts = MigrateOptions {
        device_uid,
        container: args.container.clone(),
        target_container: project.mapped_container(&args.container).map(str::to_string),
        zone_map: project.zone_map.clone(),
        with_nat: args.with_nat,
    };
    let mut recorder = Recorder::new();
    let report = migrate_container(&store, &mut recorder, &opts)
        .with_context(|| format!("migration of '{}' failed", args.container))?;

    if let Some(out) = &args.out {
        fs::write(out, serde_json::to_string_pretty(&recorder)?)
            .with_context(|| format!("cannot write {}", out.display()))?;
    }
    match args.format {
        OutputFormat::Text => println!("{}", render_migration_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
