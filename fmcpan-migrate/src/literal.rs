//! Canonicalization of inline literals into named objects.
//!
//! Policies on the source platform may embed bare addresses, ports, or URLs
//! directly in a rule instead of referencing a named object. The target
//! platform only deals in named objects, so each literal becomes a
//! canonical object whose name is a pure function of the literal's fields.
//! Re-processing the same literal therefore derives the same name and the
//! store's upsert-ignore insert makes the whole operation idempotent across
//! repeated extraction runs.

use canon_store::{
    CanonicalObject, NetworkType, ObjectKind, ObjectRef, ObjectValue, Store, StoreError, Uid,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::connector::{NetworkLiteral, PortLiteral};
use crate::protocol::{is_icmp_class, protocol_keyword, UnknownProtocolNumber};

/// Name prefix for objects converted from network literals.
pub const NETWORK_LITERAL_PREFIX: &str = "NL_";
/// Name prefix for objects converted from port/ICMP literals.
pub const PORT_LITERAL_PREFIX: &str = "PL_";
/// Name prefix for objects converted from URL literals.
pub const URL_LITERAL_PREFIX: &str = "UL_";

/// Fixed description stamped on every literal-derived object.
pub const LITERAL_DESCRIPTION: &str = "converted from literal";

/// Port value assumed when a port literal carries no port field.
pub const FULL_PORT_RANGE: &str = "1-65535";

/// Errors raised while canonicalizing a literal.
#[derive(Debug, Error)]
pub enum LiteralError {
    /// Recoverable: the literal is logged and skipped.
    #[error(transparent)]
    UnknownProtocol(#[from] UnknownProtocolNumber),
    #[error("invalid {literal_type} literal '{value}': {reason}")]
    InvalidNetwork {
        literal_type: String,
        value: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Derive a stable UID for a literal-derived object from its name.
///
/// Vendor literals carry no UID; hashing the derived name gives the same
/// identity on every run.
fn literal_uid(name: &str) -> Uid {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    Uid::new(format!("lit-{}", &digest[..32]))
}

fn insert_literal_object(
    store: &mut Store,
    container_uid: &Uid,
    name: String,
    kind: ObjectKind,
    value: ObjectValue,
) -> Result<ObjectRef, LiteralError> {
    let uid = literal_uid(&name);
    let inserted = store.insert_object(CanonicalObject {
        uid: uid.clone(),
        name: name.clone(),
        kind,
        container_uid: container_uid.clone(),
        description: LITERAL_DESCRIPTION.to_string(),
        overridable: false,
        value,
    })?;
    if !inserted {
        debug!(%name, "literal object already canonical, skipping insert");
    }
    Ok(ObjectRef::new(uid, name, kind))
}

/// Convert an inline network literal into a canonical network object.
///
/// `Host` literals become `<address>/32`; `Network` literals keep their
/// CIDR value. The derived name is
/// `NL_<address>_<prefix-length>`.
pub fn canonicalize_network_literal(
    store: &mut Store,
    container_uid: &Uid,
    literal: &NetworkLiteral,
) -> Result<ObjectRef, LiteralError> {
    let (name, value, net_type) = match literal.literal_type.as_str() {
        "Host" => {
            if literal.value.is_empty() || literal.value.contains('/') {
                return Err(invalid(literal, "expected a bare address"));
            }
            (
                format!("{NETWORK_LITERAL_PREFIX}{}_32", literal.value),
                format!("{}/32", literal.value),
                NetworkType::Host,
            )
        }
        "Network" => {
            let (addr, prefix) = literal
                .value
                .split_once('/')
                .ok_or_else(|| invalid(literal, "expected CIDR notation"))?;
            if addr.is_empty() || prefix.parse::<u8>().is_err() {
                return Err(invalid(literal, "expected CIDR notation"));
            }
            (
                format!("{NETWORK_LITERAL_PREFIX}{addr}_{prefix}"),
                literal.value.clone(),
                NetworkType::Network,
            )
        }
        _ => return Err(invalid(literal, "unsupported literal type")),
    };
    insert_literal_object(
        store,
        container_uid,
        name,
        ObjectKind::Network,
        ObjectValue::Network { value, net_type },
    )
}

fn invalid(literal: &NetworkLiteral, reason: &'static str) -> LiteralError {
    LiteralError::InvalidNetwork {
        literal_type: literal.literal_type.clone(),
        value: literal.value.clone(),
        reason,
    }
}

/// Convert an inline port literal into a canonical port or ICMP object.
///
/// ICMP-class protocols (1 and 58) are modeled as ICMP objects named after
/// their type and, when present, code; everything else becomes a port
/// object named `PL_<keyword>_<port>`, defaulting to the full port range
/// when the literal carries no port.
pub fn canonicalize_port_literal(
    store: &mut Store,
    container_uid: &Uid,
    literal: &PortLiteral,
) -> Result<ObjectRef, LiteralError> {
    let keyword = protocol_keyword(literal.protocol)?;
    if is_icmp_class(literal.protocol) {
        let name = match (literal.icmp_type, literal.code) {
            (Some(t), Some(c)) => format!("{PORT_LITERAL_PREFIX}{keyword}_{t}_{c}"),
            (Some(t), None) => format!("{PORT_LITERAL_PREFIX}{keyword}_{t}"),
            (None, _) => format!("{PORT_LITERAL_PREFIX}{keyword}_any"),
        };
        return insert_literal_object(
            store,
            container_uid,
            name,
            ObjectKind::Icmp,
            ObjectValue::Icmp {
                icmp_type: literal.icmp_type,
                code: literal.code,
            },
        );
    }
    let port = literal
        .port
        .clone()
        .unwrap_or_else(|| FULL_PORT_RANGE.to_string());
    let name = format!("{PORT_LITERAL_PREFIX}{keyword}_{port}");
    insert_literal_object(
        store,
        container_uid,
        name,
        ObjectKind::Port,
        ObjectValue::Port {
            protocol: keyword.to_string(),
            number: Some(port),
        },
    )
}

/// Convert an inline URL literal into a canonical URL object named
/// `UL_<url>`.
pub fn canonicalize_url_literal(
    store: &mut Store,
    container_uid: &Uid,
    url: &str,
) -> Result<ObjectRef, LiteralError> {
    let name = format!("{URL_LITERAL_PREFIX}{url}");
    insert_literal_object(
        store,
        container_uid,
        name,
        ObjectKind::Url,
        ObjectValue::Url {
            value: url.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use canon_store::{Container, ContainerKind};
    use pretty_assertions::assert_eq;

    use super::*;

    fn store_with_container() -> (Store, Uid) {
        let mut store = Store::new();
        let uid = Uid::new("oc-1");
        store
            .insert_container(Container::new("oc-1", "objects", ContainerKind::Object, "dev"))
            .unwrap();
        (store, uid)
    }

    #[test]
    fn host_literal_round_trips_to_slash_32_object() {
        let (mut store, container) = store_with_container();
        let literal = NetworkLiteral {
            literal_type: "Host".to_string(),
            value: "10.1.1.1".to_string(),
        };
        let reference = canonicalize_network_literal(&mut store, &container, &literal).unwrap();
        assert_eq!(reference.name, "NL_10.1.1.1_32");
        let object = store.object(&reference.uid).unwrap();
        assert_eq!(
            object.value,
            ObjectValue::Network {
                value: "10.1.1.1/32".to_string(),
                net_type: NetworkType::Host,
            }
        );
        assert!(!object.overridable);
        assert_eq!(object.description, LITERAL_DESCRIPTION);
    }

    #[test]
    fn network_literal_keeps_cidr_value() {
        let (mut store, container) = store_with_container();
        let literal = NetworkLiteral {
            literal_type: "Network".to_string(),
            value: "10.0.0.0/24".to_string(),
        };
        let reference = canonicalize_network_literal(&mut store, &container, &literal).unwrap();
        assert_eq!(reference.name, "NL_10.0.0.0_24");
        let object = store.object(&reference.uid).unwrap();
        assert_eq!(
            object.value,
            ObjectValue::Network {
                value: "10.0.0.0/24".to_string(),
                net_type: NetworkType::Network,
            }
        );
    }

    #[test]
    fn canonicalizing_the_same_literal_twice_is_a_no_op() {
        let (mut store, container) = store_with_container();
        let literal = NetworkLiteral {
            literal_type: "Host".to_string(),
            value: "192.0.2.7".to_string(),
        };
        let first = canonicalize_network_literal(&mut store, &container, &literal).unwrap();
        let second = canonicalize_network_literal(&mut store, &container, &literal).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.objects_in(&container).len(), 1);
    }

    #[test]
    fn port_literal_defaults_to_full_range() {
        let (mut store, container) = store_with_container();
        let literal = PortLiteral {
            protocol: 6,
            port: None,
            icmp_type: None,
            code: None,
        };
        let reference = canonicalize_port_literal(&mut store, &container, &literal).unwrap();
        assert_eq!(reference.name, "PL_tcp_1-65535");
        assert_eq!(reference.kind, ObjectKind::Port);
    }

    #[test]
    fn icmp_literal_names_use_type_and_code() {
        let (mut store, container) = store_with_container();
        let echo = PortLiteral {
            protocol: 1,
            port: None,
            icmp_type: Some(8),
            code: None,
        };
        let reference = canonicalize_port_literal(&mut store, &container, &echo).unwrap();
        assert_eq!(reference.name, "PL_icmp_8");
        assert_eq!(reference.kind, ObjectKind::Icmp);

        let unreachable = PortLiteral {
            protocol: 1,
            port: None,
            icmp_type: Some(3),
            code: Some(1),
        };
        let reference = canonicalize_port_literal(&mut store, &container, &unreachable).unwrap();
        assert_eq!(reference.name, "PL_icmp_3_1");
    }

    #[test]
    fn unknown_protocol_number_is_recoverable() {
        let (mut store, container) = store_with_container();
        let literal = PortLiteral {
            protocol: 233,
            port: Some("5".to_string()),
            icmp_type: None,
            code: None,
        };
        let err = canonicalize_port_literal(&mut store, &container, &literal).unwrap_err();
        assert!(matches!(err, LiteralError::UnknownProtocol(_)));
        assert!(store.objects_in(&container).is_empty());
    }

    #[test]
    fn url_literal_gets_prefixed_name() {
        let (mut store, container) = store_with_container();
        let reference =
            canonicalize_url_literal(&mut store, &container, "malware.example.com").unwrap();
        assert_eq!(reference.name, "UL_malware.example.com");
        assert_eq!(reference.kind, ObjectKind::Url);
    }

    #[test]
    fn malformed_network_literal_is_rejected() {
        let (mut store, container) = store_with_container();
        let literal = NetworkLiteral {
            literal_type: "Network".to_string(),
            value: "10.0.0.0".to_string(),
        };
        let err = canonicalize_network_literal(&mut store, &container, &literal).unwrap_err();
        assert!(matches!(err, LiteralError::InvalidNetwork { .. }));
    }
}
