use serde::{Deserialize, Serialize};

use crate::ids::Uid;

/// Scope flavor of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Object,
    SecurityPolicy,
    NatPolicy,
    Zone,
    ManagedDevice,
}

/// A named grouping scope for objects or policies.
///
/// `parent` starts unset; extraction materializes all containers of a device
/// first and then rewires parent pointers in a second pass once every
/// sibling exists. The parent relation is a tree: [`crate::Store`] rejects
/// self-parenting and cycles at rewire time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub uid: Uid,
    pub name: String,
    pub kind: ContainerKind,
    pub device_uid: Uid,
    #[serde(default)]
    pub parent: Option<Uid>,
}

impl Container {
    pub fn new(
        uid: impl Into<Uid>,
        name: impl Into<String>,
        kind: ContainerKind,
        device_uid: impl Into<Uid>,
    ) -> Self {
        Container {
            uid: uid.into(),
            name: name.into(),
            kind,
            device_uid: device_uid.into(),
            parent: None,
        }
    }
}
