use serde::{Deserialize, Serialize};

use crate::ids::{Identity, Uid};
use crate::object::ObjectKind;

/// Reference from a policy flow to a canonical object or group.
///
/// Carries the referent's identity and kind so callers can partition
/// concrete objects from groups without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub uid: Uid,
    pub name: String,
    pub kind: ObjectKind,
}

impl ObjectRef {
    pub fn new(uid: impl Into<Uid>, name: impl Into<String>, kind: ObjectKind) -> Self {
        ObjectRef {
            uid: uid.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.uid.clone(), self.name.clone())
    }
}

/// Rule action of a security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Allow,
    Block,
    Trust,
    Monitor,
}

/// An ordered rule within a security-policy container.
///
/// Every reference set models the vendor value "any" as the empty vector;
/// absence of a restriction is data, not an error. Read-only after
/// creation: migration derives new target-side rules instead of mutating
/// canonical ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub uid: Uid,
    pub name: String,
    pub container_uid: Uid,
    /// Evaluation order, unique within the container.
    pub position: u32,
    pub enabled: bool,
    pub action: PolicyAction,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub log_begin: bool,
    #[serde(default)]
    pub log_end: bool,
    #[serde(default)]
    pub src_zones: Vec<ObjectRef>,
    #[serde(default)]
    pub dst_zones: Vec<ObjectRef>,
    #[serde(default)]
    pub src_networks: Vec<ObjectRef>,
    #[serde(default)]
    pub dst_networks: Vec<ObjectRef>,
    #[serde(default)]
    pub src_ports: Vec<ObjectRef>,
    #[serde(default)]
    pub dst_ports: Vec<ObjectRef>,
    #[serde(default)]
    pub users: Vec<ObjectRef>,
    #[serde(default)]
    pub urls: Vec<ObjectRef>,
    #[serde(default)]
    pub applications: Vec<ObjectRef>,
    #[serde(default)]
    pub schedule: Option<ObjectRef>,
}

/// An ordered address-translation rule within a NAT-policy container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatPolicy {
    pub uid: Uid,
    pub name: String,
    pub container_uid: Uid,
    pub position: u32,
    pub enabled: bool,
    #[serde(default)]
    pub src_zone: Option<ObjectRef>,
    #[serde(default)]
    pub dst_zone: Option<ObjectRef>,
    #[serde(default)]
    pub original_source: Option<ObjectRef>,
    #[serde(default)]
    pub translated_source: Option<ObjectRef>,
    #[serde(default)]
    pub original_destination: Option<ObjectRef>,
    #[serde(default)]
    pub translated_destination: Option<ObjectRef>,
    #[serde(default)]
    pub service: Option<ObjectRef>,
}
