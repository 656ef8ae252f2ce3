use serde::{Deserialize, Serialize};

use crate::ids::Uid;

/// A device enrolled under a managed-device container.
///
/// `assigned_policy` references the security-policy container deployed to
/// the device, when the vendor reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDevice {
    pub uid: Uid,
    pub name: String,
    pub container_uid: Uid,
    pub hostname: String,
    #[serde(default)]
    pub assigned_policy: Option<Uid>,
    #[serde(default)]
    pub cluster: Option<String>,
}
