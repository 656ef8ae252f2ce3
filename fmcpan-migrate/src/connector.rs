//! Vendor connector abstractions and the record shapes they exchange.
//!
//! The engine never talks HTTP itself: it consumes a [`SourceConnector`]
//! yielding structured extraction records and produces creation calls
//! through a [`TargetConnector`]. Transport, sessions, and pagination are
//! the connector implementation's problem.
//!
//! Two concrete implementations ship with the tool: [`FileSource`] reads a
//! JSON export of a source controller, and [`Recorder`] captures target
//! creation calls as rows (used by tests and by dry-run migration).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use canon_store::{ContainerKind, ObjectKind, ObjectValue, PolicyAction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transform::{
    AddressCreate, AddressGroupCreate, NatRuleCreate, RuleCreate, ServiceCreate,
    ServiceGroupCreate, UrlCategoryCreate,
};

/// Errors raised by connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("container '{name}' not found on source")]
    UnknownContainer { name: String },
    #[error("failed to read export {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse export {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("target rejected {kind} '{name}': {reason}")]
    Rejected {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

/// A container as reported by the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// A managed device as reported by the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    /// Name of the security-policy container assigned to the device.
    #[serde(default)]
    pub assigned_policy: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
}

/// Reference to a named object or group embedded in vendor data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRecord {
    pub uid: String,
    pub name: String,
    pub kind: ObjectKind,
}

/// A named object as reported by the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub uid: String,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub overridable: bool,
    /// Owning container name; defaults to the device's object container.
    #[serde(default)]
    pub container: Option<String>,
    /// Kind-specific payload; absent for kinds that carry only a name.
    #[serde(default)]
    pub value: Option<ObjectValue>,
}

/// A group object with its direct member lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub uid: String,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub overridable: bool,
    #[serde(default)]
    pub container: Option<String>,
    /// Direct concrete-object members, by reference.
    #[serde(default)]
    pub objects: Vec<RefRecord>,
    /// Direct subgroup members, by reference.
    #[serde(default)]
    pub groups: Vec<RefRecord>,
    /// Inline network literals embedded in the group body.
    #[serde(default)]
    pub literals: Vec<NetworkLiteral>,
}

/// An inline network value embedded in a policy rule or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLiteral {
    /// Vendor literal type: `Host` or `Network`.
    #[serde(rename = "type")]
    pub literal_type: String,
    pub value: String,
}

/// An inline port or ICMP value embedded in a policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLiteral {
    /// IP protocol number.
    pub protocol: u8,
    /// Port or port range; absent means the full range.
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub icmp_type: Option<u8>,
    #[serde(default)]
    pub code: Option<u8>,
}

fn default_true() -> bool {
    true
}

/// An ordered security-policy rule as reported by the source platform.
///
/// Every reference list defaults to empty: a missing restriction is the
/// vendor value "any", not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub uid: String,
    pub name: String,
    pub position: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub action: PolicyAction,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub log_begin: bool,
    #[serde(default)]
    pub log_end: bool,
    #[serde(default)]
    pub src_zones: Vec<RefRecord>,
    #[serde(default)]
    pub dst_zones: Vec<RefRecord>,
    #[serde(default)]
    pub src_networks: Vec<RefRecord>,
    #[serde(default)]
    pub src_network_literals: Vec<NetworkLiteral>,
    #[serde(default)]
    pub dst_networks: Vec<RefRecord>,
    #[serde(default)]
    pub dst_network_literals: Vec<NetworkLiteral>,
    #[serde(default)]
    pub src_ports: Vec<RefRecord>,
    #[serde(default)]
    pub src_port_literals: Vec<PortLiteral>,
    #[serde(default)]
    pub dst_ports: Vec<RefRecord>,
    #[serde(default)]
    pub dst_port_literals: Vec<PortLiteral>,
    #[serde(default)]
    pub users: Vec<RefRecord>,
    #[serde(default)]
    pub urls: Vec<RefRecord>,
    #[serde(default)]
    pub url_literals: Vec<String>,
    #[serde(default)]
    pub applications: Vec<RefRecord>,
    #[serde(default)]
    pub schedule: Option<RefRecord>,
}

/// An ordered NAT rule as reported by the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatPolicyRecord {
    pub uid: String,
    pub name: String,
    pub position: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub src_zone: Option<RefRecord>,
    #[serde(default)]
    pub dst_zone: Option<RefRecord>,
    #[serde(default)]
    pub original_source: Option<RefRecord>,
    #[serde(default)]
    pub translated_source: Option<RefRecord>,
    #[serde(default)]
    pub original_destination: Option<RefRecord>,
    #[serde(default)]
    pub translated_destination: Option<RefRecord>,
    #[serde(default)]
    pub service: Option<RefRecord>,
}

/// Read-only structured extraction from a source platform.
pub trait SourceConnector {
    fn containers(&self, kind: ContainerKind) -> Result<Vec<ContainerRecord>, ConnectorError>;
    fn container(&self, kind: ContainerKind, name: &str)
        -> Result<ContainerRecord, ConnectorError>;
    fn objects(&self) -> Result<Vec<ObjectRecord>, ConnectorError>;
    fn groups(&self) -> Result<Vec<GroupRecord>, ConnectorError>;
    fn devices(&self) -> Result<Vec<DeviceRecord>, ConnectorError>;
    fn security_policies(&self, container: &str) -> Result<Vec<PolicyRecord>, ConnectorError>;
    fn nat_policies(&self, container: &str) -> Result<Vec<NatPolicyRecord>, ConnectorError>;
}

/// Creation calls against a target platform.
///
/// A `None` from [`TargetConnector::find_container`] is a fatal
/// precondition for the whole run; individual `create_*` failures are
/// recoverable per item.
pub trait TargetConnector {
    fn find_container(&self, kind: ContainerKind, name: &str) -> Option<String>;
    fn create_address(&mut self, container: &str, req: AddressCreate)
        -> Result<(), ConnectorError>;
    fn create_service(&mut self, container: &str, req: ServiceCreate)
        -> Result<(), ConnectorError>;
    fn create_address_group(
        &mut self,
        container: &str,
        req: AddressGroupCreate,
    ) -> Result<(), ConnectorError>;
    fn create_service_group(
        &mut self,
        container: &str,
        req: ServiceGroupCreate,
    ) -> Result<(), ConnectorError>;
    fn create_url_category(
        &mut self,
        container: &str,
        req: UrlCategoryCreate,
    ) -> Result<(), ConnectorError>;
    fn create_security_rule(&mut self, container: &str, req: RuleCreate)
        -> Result<(), ConnectorError>;
    fn create_nat_rule(&mut self, container: &str, req: NatRuleCreate)
        -> Result<(), ConnectorError>;
}

/// Full JSON export of a source controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceExport {
    #[serde(default)]
    pub object_containers: Vec<ContainerRecord>,
    #[serde(default)]
    pub security_policy_containers: Vec<ContainerRecord>,
    #[serde(default)]
    pub nat_policy_containers: Vec<ContainerRecord>,
    #[serde(default)]
    pub zone_containers: Vec<ContainerRecord>,
    #[serde(default)]
    pub device_containers: Vec<ContainerRecord>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    /// Security policies keyed by container name, in evaluation order.
    #[serde(default)]
    pub security_policies: BTreeMap<String, Vec<PolicyRecord>>,
    /// NAT policies keyed by container name, in evaluation order.
    #[serde(default)]
    pub nat_policies: BTreeMap<String, Vec<NatPolicyRecord>>,
}

/// Source connector backed by a JSON export file.
#[derive(Debug, Clone)]
pub struct FileSource {
    export: SourceExport,
}

impl FileSource {
    pub fn load(path: &Path) -> Result<Self, ConnectorError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConnectorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let export = serde_json::from_str(&raw).map_err(|source| ConnectorError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(FileSource { export })
    }

    pub fn from_export(export: SourceExport) -> Self {
        FileSource { export }
    }

    fn table(&self, kind: ContainerKind) -> &[ContainerRecord] {
        match kind {
            ContainerKind::Object => &self.export.object_containers,
            ContainerKind::SecurityPolicy => &self.export.security_policy_containers,
            ContainerKind::NatPolicy => &self.export.nat_policy_containers,
            ContainerKind::Zone => &self.export.zone_containers,
            ContainerKind::ManagedDevice => &self.export.device_containers,
        }
    }
}

impl SourceConnector for FileSource {
    fn containers(&self, kind: ContainerKind) -> Result<Vec<ContainerRecord>, ConnectorError> {
        Ok(self.table(kind).to_vec())
    }

    fn container(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> Result<ContainerRecord, ConnectorError> {
        self.table(kind)
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownContainer {
                name: name.to_string(),
            })
    }

    fn objects(&self) -> Result<Vec<ObjectRecord>, ConnectorError> {
        Ok(self.export.objects.clone())
    }

    fn groups(&self) -> Result<Vec<GroupRecord>, ConnectorError> {
        Ok(self.export.groups.clone())
    }

    fn devices(&self) -> Result<Vec<DeviceRecord>, ConnectorError> {
        Ok(self.export.devices.clone())
    }

    fn security_policies(&self, container: &str) -> Result<Vec<PolicyRecord>, ConnectorError> {
        Ok(self
            .export
            .security_policies
            .get(container)
            .cloned()
            .unwrap_or_default())
    }

    fn nat_policies(&self, container: &str) -> Result<Vec<NatPolicyRecord>, ConnectorError> {
        Ok(self
            .export
            .nat_policies
            .get(container)
            .cloned()
            .unwrap_or_default())
    }
}

/// Target connector that records creation calls instead of sending them.
///
/// Serializes to the same JSON shape a real connector would send, which is
/// what dry-run migration prints. Tests can restrict the set of known
/// containers and force per-item rejections.
#[derive(Debug, Default, Serialize)]
pub struct Recorder {
    pub addresses: Vec<AddressCreate>,
    pub services: Vec<ServiceCreate>,
    pub address_groups: Vec<AddressGroupCreate>,
    pub service_groups: Vec<ServiceGroupCreate>,
    pub url_categories: Vec<UrlCategoryCreate>,
    pub rules: Vec<RuleCreate>,
    pub nat_rules: Vec<NatRuleCreate>,
    /// When set, `find_container` only resolves these names.
    #[serde(skip)]
    pub known_containers: Option<BTreeSet<String>>,
    /// Names whose creation calls fail, for error-path tests.
    #[serde(skip)]
    pub fail_names: BTreeSet<String>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    fn check(&self, kind: &'static str, name: &str) -> Result<(), ConnectorError> {
        if self.fail_names.contains(name) {
            return Err(ConnectorError::Rejected {
                kind,
                name: name.to_string(),
                reason: "rejected by test fixture".to_string(),
            });
        }
        Ok(())
    }
}

impl TargetConnector for Recorder {
    fn find_container(&self, _kind: ContainerKind, name: &str) -> Option<String> {
        match &self.known_containers {
            Some(known) if !known.contains(name) => None,
            _ => Some(name.to_string()),
        }
    }

    fn create_address(
        &mut self,
        _container: &str,
        req: AddressCreate,
    ) -> Result<(), ConnectorError> {
        self.check("address", &req.name)?;
        self.addresses.push(req);
        Ok(())
    }

    fn create_service(
        &mut self,
        _container: &str,
        req: ServiceCreate,
    ) -> Result<(), ConnectorError> {
        self.check("service", &req.name)?;
        self.services.push(req);
        Ok(())
    }

    fn create_address_group(
        &mut self,
        _container: &str,
        req: AddressGroupCreate,
    ) -> Result<(), ConnectorError> {
        self.check("address-group", &req.name)?;
        self.address_groups.push(req);
        Ok(())
    }

    fn create_service_group(
        &mut self,
        _container: &str,
        req: ServiceGroupCreate,
    ) -> Result<(), ConnectorError> {
        self.check("service-group", &req.name)?;
        self.service_groups.push(req);
        Ok(())
    }

    fn create_url_category(
        &mut self,
        _container: &str,
        req: UrlCategoryCreate,
    ) -> Result<(), ConnectorError> {
        self.check("url-category", &req.name)?;
        self.url_categories.push(req);
        Ok(())
    }

    fn create_security_rule(
        &mut self,
        _container: &str,
        req: RuleCreate,
    ) -> Result<(), ConnectorError> {
        self.check("security-rule", &req.name)?;
        self.rules.push(req);
        Ok(())
    }

    fn create_nat_rule(
        &mut self,
        _container: &str,
        req: NatRuleCreate,
    ) -> Result<(), ConnectorError> {
        self.check("nat-rule", &req.name)?;
        self.nat_rules.push(req);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_source_resolves_containers_by_kind_and_name() {
        let export = SourceExport {
            security_policy_containers: vec![ContainerRecord {
                uid: "pc-1".to_string(),
                name: "branch".to_string(),
                parent: Some("global".to_string()),
            }],
            ..SourceExport::default()
        };
        let source = FileSource::from_export(export);

        let rec = source
            .container(ContainerKind::SecurityPolicy, "branch")
            .unwrap();
        assert_eq!(rec.parent.as_deref(), Some("global"));

        let err = source
            .container(ContainerKind::Object, "branch")
            .unwrap_err();
        assert!(matches!(err, ConnectorError::UnknownContainer { .. }));
    }

    #[test]
    fn policy_record_defaults_missing_reference_sets_to_any() {
        let raw = r#"{
            "uid": "p-1",
            "name": "allow-web",
            "position": 1,
            "action": "allow"
        }"#;
        let rec: PolicyRecord = serde_json::from_str(raw).unwrap();
        assert!(rec.enabled);
        assert!(rec.src_zones.is_empty());
        assert!(rec.dst_ports.is_empty());
        assert!(rec.schedule.is_none());
    }

    #[test]
    fn recorder_reports_unknown_container_when_restricted() {
        let mut recorder = Recorder::new();
        recorder.known_containers = Some(["edge".to_string()].into_iter().collect());
        assert!(recorder
            .find_container(ContainerKind::SecurityPolicy, "edge")
            .is_some());
        assert!(recorder
            .find_container(ContainerKind::SecurityPolicy, "core")
            .is_none());
    }
}
