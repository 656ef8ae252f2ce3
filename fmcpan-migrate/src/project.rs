//! TOML project file: devices, source/target selection, container and
//! zone mappings.
//!
//! A migration project is a small TOML document edited through the CLI.
//! It carries no extracted configuration, only the knobs needed to drive a
//! run: which device exports to read, which device is source and which is
//! target, and how source container and zone names map onto the target.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned when loading or saving a project file.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read project file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse project file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("failed to serialize project: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("project has no {role} device set")]
    NoDevice { role: &'static str },
    #[error("device '{name}' is not defined in the project")]
    UnknownDevice { name: String },
}

/// One security device known to the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub uid: String,
    /// Platform flavor, e.g. `fmc` or `panorama`.
    pub platform: String,
    /// Path of the device's JSON export, for file-backed connectors.
    #[serde(default)]
    pub export: Option<PathBuf>,
}

/// A migration project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEntry>,
    /// Name of the source device.
    #[serde(default)]
    pub source: Option<String>,
    /// Name of the target device.
    #[serde(default)]
    pub target: Option<String>,
    /// Source container name to target container name.
    #[serde(default)]
    pub container_map: BTreeMap<String, String>,
    /// Source zone name to target zone name.
    #[serde(default)]
    pub zone_map: BTreeMap<String, String>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let raw = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ProjectError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw).map_err(|source| ProjectError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// The device currently selected as migration source.
    pub fn source_device(&self) -> Result<(&str, &DeviceEntry), ProjectError> {
        let name = self
            .source
            .as_deref()
            .ok_or(ProjectError::NoDevice { role: "source" })?;
        let entry = self
            .devices
            .get(name)
            .ok_or_else(|| ProjectError::UnknownDevice {
                name: name.to_string(),
            })?;
        Ok((name, entry))
    }

    /// Target container name mapped for a source container, when set.
    pub fn mapped_container(&self, source_name: &str) -> Option<&str> {
        self.container_map.get(source_name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let mut project = Project {
            name: "branch-cutover".to_string(),
            ..Project::default()
        };
        project.devices.insert(
            "fmc-east".to_string(),
            DeviceEntry {
                uid: "dev-1".to_string(),
                platform: "fmc".to_string(),
                export: Some(PathBuf::from("exports/fmc-east.json")),
            },
        );
        project.source = Some("fmc-east".to_string());
        project
            .zone_map
            .insert("inside".to_string(), "trust".to_string());

        let raw = toml::to_string_pretty(&project).unwrap();
        let parsed: Project = toml::from_str(&raw).unwrap();
        assert_eq!(parsed, project);
    }

    #[test]
    fn missing_source_device_is_reported() {
        let project = Project::default();
        let err = project.source_device().unwrap_err();
        assert!(matches!(err, ProjectError::NoDevice { role: "source" }));

        let mut with_dangling = Project::default();
        with_dangling.source = Some("ghost".to_string());
        let err = with_dangling.source_device().unwrap_err();
        assert!(matches!(err, ProjectError::UnknownDevice { .. }));
    }
}
