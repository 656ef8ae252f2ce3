use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque unique identifier for a canonical row.
///
/// Vendor-supplied UIDs are carried through verbatim; objects derived from
/// inline literals get a UID computed from their content so identity is
/// stable across extraction runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(raw: impl Into<String>) -> Self {
        Uid(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(raw: &str) -> Self {
        Uid(raw.to_string())
    }
}

impl From<String> for Uid {
    fn from(raw: String) -> Self {
        Uid(raw)
    }
}

/// Identity of a canonical object: the (UID, name) pair.
///
/// Two references resolve to the same object exactly when both components
/// match. Used as the key of resolution-time identity caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub uid: Uid,
    pub name: String,
}

impl Identity {
    pub fn new(uid: impl Into<Uid>, name: impl Into<String>) -> Self {
        Identity {
            uid: uid.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}
