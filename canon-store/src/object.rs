use serde::{Deserialize, Serialize};

use crate::ids::{Identity, Uid};

/// Object class of a canonical object.
///
/// Group kinds are distinct from their element kinds so that resolution can
/// tell "expand me" references apart from concrete ones without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Network,
    NetworkGroup,
    Port,
    PortGroup,
    Icmp,
    Url,
    UrlGroup,
    Geolocation,
    Schedule,
    User,
    Application,
    Zone,
}

impl ObjectKind {
    /// Whether this kind owns member sets that resolution must expand.
    pub fn is_group(self) -> bool {
        matches!(
            self,
            ObjectKind::NetworkGroup | ObjectKind::PortGroup | ObjectKind::UrlGroup
        )
    }
}

/// Address shape of a network object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Host,
    Network,
    Range,
    Fqdn,
}

/// Kind-specific payload of a canonical object.
///
/// Expressed as a sum type rather than per-kind record types so a single
/// object table can hold every class; kinds without extra fields (zones,
/// schedules, users, applications, geolocations, groups) carry `Plain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectValue {
    Network {
        value: String,
        net_type: NetworkType,
    },
    Port {
        protocol: String,
        number: Option<String>,
    },
    Icmp {
        icmp_type: Option<u8>,
        code: Option<u8>,
    },
    Url {
        value: String,
    },
    Plain,
}

/// A named network/port/URL/ICMP/geolocation/schedule/user/application
/// entity in the canonical schema.
///
/// Immutable after insertion: migration derives new target-side records
/// rather than editing canonical ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalObject {
    pub uid: Uid,
    pub name: String,
    pub kind: ObjectKind,
    pub container_uid: Uid,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub overridable: bool,
    pub value: ObjectValue,
}

impl CanonicalObject {
    pub fn identity(&self) -> Identity {
        Identity::new(self.uid.clone(), self.name.clone())
    }
}
