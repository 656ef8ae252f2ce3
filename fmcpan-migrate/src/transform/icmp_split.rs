//! The ICMP/ping policy split.
//!
//! The target platform models ICMP reachability as the `ping` application,
//! not as a transport-port object. A policy whose destination-port set
//! contains an ICMP object, directly or inside a referenced port group, is
//! split in two: the original rule with every ICMP reference removed, and a
//! sibling rule with destination ports "any" and application `ping`
//! carrying the same zones, networks, users, schedule, and action.

use canon_store::{ObjectKind, ObjectRef, SecurityPolicy, Store};
use tracing::debug;

use super::groups::{contains_icmp, empty_after_icmp_strip};

/// Name of the target application expressing ICMP reachability.
pub const PING_APPLICATION: &str = "ping";

/// Suffix appended to the split-off sibling policy's name.
pub const PING_SUFFIX: &str = "_ping";

/// Outcome of splitting one policy.
#[derive(Debug)]
pub struct SplitPolicies {
    /// The original policy with ICMP references removed from its
    /// destination-port set. An emptied set means "any".
    pub primary: SecurityPolicy,
    /// The ping sibling, present only when ICMP was found.
    pub ping: Option<SecurityPolicy>,
}

/// Split a policy if its destination ports carry ICMP semantics.
///
/// Direct ICMP references are dropped. A referenced port group that would
/// be empty once its ICMP members are stripped is deleted target-side, so
/// its reference is dropped here too; groups that keep non-ICMP members
/// stay referenced (the group itself is re-expressed without ICMP during
/// group migration).
pub fn split_icmp(store: &Store, policy: &SecurityPolicy) -> SplitPolicies {
    let mut kept: Vec<ObjectRef> = Vec::new();
    let mut found_icmp = false;

    for reference in &policy.dst_ports {
        match reference.kind {
            ObjectKind::Icmp => {
                found_icmp = true;
            }
            ObjectKind::PortGroup if contains_icmp(store, &reference.uid) => {
                found_icmp = true;
                if empty_after_icmp_strip(store, &reference.uid) {
                    debug!(
                        policy = %policy.name,
                        group = %reference.name,
                        "port group empties after ICMP strip, reference drops to any"
                    );
                } else {
                    kept.push(reference.clone());
                }
            }
            _ => kept.push(reference.clone()),
        }
    }

    let mut primary = policy.clone();
    primary.dst_ports = kept;

    if !found_icmp {
        return SplitPolicies {
            primary,
            ping: None,
        };
    }

    let mut ping = policy.clone();
    ping.uid = canon_store::Uid::new(format!("{}-ping", policy.uid));
    ping.name = format!("{}{PING_SUFFIX}", policy.name);
    ping.src_ports = Vec::new();
    ping.dst_ports = Vec::new();
    ping.urls = Vec::new();
    ping.applications = vec![ObjectRef::new(
        format!("{}-ping-app", policy.uid),
        PING_APPLICATION,
        ObjectKind::Application,
    )];
    debug!(policy = %policy.name, sibling = %ping.name, "split ICMP into ping application policy");

    SplitPolicies {
        primary,
        ping: Some(ping),
    }
}

#[cfg(test)]
mod tests {
    use canon_store::{
        CanonicalObject, Container, ContainerKind, ObjectValue, PolicyAction, Uid,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn seed() -> Store {
        let mut store = Store::new();
        store
            .insert_container(Container::new("oc", "objects", ContainerKind::Object, "dev"))
            .unwrap();
        store
            .insert_container(Container::new(
                "pc",
                "policies",
                ContainerKind::SecurityPolicy,
                "dev",
            ))
            .unwrap();
        store
    }

    fn add(store: &mut Store, uid: &str, name: &str, kind: ObjectKind) -> ObjectRef {
        store
            .insert_object(CanonicalObject {
                uid: uid.into(),
                name: name.to_string(),
                kind,
                container_uid: "oc".into(),
                description: String::new(),
                overridable: false,
                value: ObjectValue::Plain,
            })
            .unwrap();
        ObjectRef::new(uid, name, kind)
    }

    fn policy(dst_ports: Vec<ObjectRef>) -> SecurityPolicy {
        SecurityPolicy {
            uid: Uid::new("p-1"),
            name: "allow-web".to_string(),
            container_uid: "pc".into(),
            position: 1,
            enabled: true,
            action: PolicyAction::Allow,
            section: None,
            log_begin: false,
            log_end: true,
            src_zones: vec![ObjectRef::new("z-1", "Z1", ObjectKind::Zone)],
            dst_zones: vec![],
            src_networks: vec![],
            dst_networks: vec![],
            src_ports: vec![],
            dst_ports,
            users: vec![ObjectRef::new("u-1", "staff", ObjectKind::User)],
            urls: vec![],
            applications: vec![],
            schedule: None,
        }
    }

    #[test]
    fn policy_with_direct_icmp_ref_splits_in_two() {
        let mut store = seed();
        let tcp = add(&mut store, "o-tcp", "TCP-80", ObjectKind::Port);
        let ping = add(&mut store, "o-ping", "PING-ANY", ObjectKind::Icmp);

        let split = split_icmp(&store, &policy(vec![tcp.clone(), ping]));

        assert_eq!(split.primary.dst_ports, vec![tcp]);
        let sibling = split.ping.expect("ping sibling");
        assert_eq!(sibling.name, "allow-web_ping");
        assert!(sibling.dst_ports.is_empty());
        assert_eq!(sibling.applications.len(), 1);
        assert_eq!(sibling.applications[0].name, PING_APPLICATION);
        // Zones, users, and action carry over unchanged.
        assert_eq!(sibling.src_zones, split.primary.src_zones);
        assert_eq!(sibling.users, split.primary.users);
        assert_eq!(sibling.action, split.primary.action);
    }

    #[test]
    fn icmp_only_destination_set_becomes_any() {
        let mut store = seed();
        let ping = add(&mut store, "o-ping", "PING-ANY", ObjectKind::Icmp);

        let split = split_icmp(&store, &policy(vec![ping]));
        assert!(split.primary.dst_ports.is_empty());
        assert!(split.ping.is_some());
    }

    #[test]
    fn group_emptied_by_strip_is_dropped_from_the_policy() {
        let mut store = seed();
        let group = add(&mut store, "g-1", "ping-grp", ObjectKind::PortGroup);
        let echo = add(&mut store, "o-echo", "echo", ObjectKind::Icmp);
        store.insert_object_member(&group.uid, &echo.uid).unwrap();

        let split = split_icmp(&store, &policy(vec![group]));
        assert!(split.primary.dst_ports.is_empty());
        assert!(split.ping.is_some());
    }

    #[test]
    fn mixed_group_stays_referenced_and_still_triggers_split() {
        let mut store = seed();
        let group = add(&mut store, "g-1", "mixed", ObjectKind::PortGroup);
        let echo = add(&mut store, "o-echo", "echo", ObjectKind::Icmp);
        let tcp = add(&mut store, "o-tcp", "tcp-443", ObjectKind::Port);
        store.insert_object_member(&group.uid, &echo.uid).unwrap();
        store.insert_object_member(&group.uid, &tcp.uid).unwrap();

        let split = split_icmp(&store, &policy(vec![group.clone()]));
        assert_eq!(split.primary.dst_ports, vec![group]);
        assert!(split.ping.is_some());
    }

    #[test]
    fn policy_without_icmp_passes_through_unsplit() {
        let mut store = seed();
        let tcp = add(&mut store, "o-tcp", "TCP-80", ObjectKind::Port);
        let split = split_icmp(&store, &policy(vec![tcp.clone()]));
        assert_eq!(split.primary.dst_ports, vec![tcp]);
        assert!(split.ping.is_none());
    }
}
