//! Migration pipeline: expand stored policies and emit target creation
//! calls.
//!
//! Policies are re-read from the canonical store in evaluation order, their
//! referenced object and group sets expanded through one shared
//! [`ResolutionContext`] so every object is migrated exactly once, then the
//! [`Transformer`] maps each record to a target creation request. An
//! individual object or policy the target rejects is logged with its name
//! and skipped; a target container that cannot be located aborts the run.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use canon_store::{CanonicalObject, ContainerKind, ObjectKind, ObjectRef, Store, Uid};
use colored::Colorize;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::connector::{ConnectorError, TargetConnector};
use crate::resolve::{detect_membership_cycles, ResolutionContext, ResolveError};
use crate::transform::{split_icmp, Transformer};

/// Errors that abort a migration run.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("security-policy container '{name}' not found in the canonical store")]
    UnknownContainer { name: String },
    #[error("no matching container '{name}' on the target platform")]
    TargetContainerMissing { name: String },
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Parameters of one migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Source device whose canonical rows are migrated.
    pub device_uid: Uid,
    /// Canonical security-policy container to migrate.
    pub container: String,
    /// Container name on the target; defaults to the source name.
    pub target_container: Option<String>,
    /// Source zone name to target zone name.
    pub zone_map: BTreeMap<String, String>,
    /// Also migrate the NAT-policy container of the same name.
    pub with_nat: bool,
}

/// An item the target rejected, recorded and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub kind: String,
    pub name: String,
    pub reason: String,
}

/// Outcome of one migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub container: String,
    pub target_container: String,
    pub addresses: usize,
    pub services: usize,
    pub url_categories: usize,
    pub address_groups: usize,
    pub service_groups: usize,
    pub rules: usize,
    pub nat_rules: usize,
    /// Policies that were split into a ping sibling.
    pub split_policies: Vec<String>,
    /// Policies whose source-port restriction has no target counterpart
    /// and widens to any.
    pub widened_policies: Vec<String>,
    /// Groups whose membership graph contains a cycle.
    pub cyclic_groups: Vec<String>,
    pub skipped: Vec<SkippedItem>,
}

/// Migrate one security-policy container to the target platform.
pub fn migrate_container(
    store: &Store,
    target: &mut dyn TargetConnector,
    opts: &MigrateOptions,
) -> Result<MigrationReport, MigrateError> {
    let container = store
        .container_by_name(&opts.device_uid, ContainerKind::SecurityPolicy, &opts.container)
        .ok_or_else(|| MigrateError::UnknownContainer {
            name: opts.container.clone(),
        })?;
    let target_name = opts
        .target_container
        .clone()
        .unwrap_or_else(|| opts.container.clone());
    let target_container = target
        .find_container(ContainerKind::SecurityPolicy, &target_name)
        .ok_or(MigrateError::TargetContainerMissing { name: target_name })?;

    let mut report = MigrationReport {
        container: opts.container.clone(),
        target_container: target_container.clone(),
        ..MigrationReport::default()
    };

    let policies: Vec<_> = store
        .security_policies_in(&container.uid)
        .into_iter()
        .cloned()
        .collect();

    // One identity cache for the whole run: an object referenced from any
    // flow of any policy is expanded and emitted exactly once.
    let mut ctx = ResolutionContext::new();
    let mut objects: Vec<Rc<CanonicalObject>> = Vec::new();
    let mut groups: Vec<Rc<CanonicalObject>> = Vec::new();
    let mut seen = HashSet::new();
    let mut unresolved: HashSet<Uid> = HashSet::new();
    for policy in &policies {
        let mut references: Vec<ObjectRef> = Vec::new();
        references.extend(policy.src_networks.iter().cloned());
        references.extend(policy.dst_networks.iter().cloned());
        references.extend(policy.src_ports.iter().cloned());
        references.extend(policy.dst_ports.iter().cloned());
        references.extend(policy.urls.iter().cloned());
        match ctx.resolve(store, &references) {
            Ok(closure) => {
                objects.extend(
                    closure
                        .objects
                        .into_iter()
                        .filter(|o| seen.insert(o.identity())),
                );
                groups.extend(
                    closure
                        .groups
                        .into_iter()
                        .filter(|g| seen.insert(g.identity())),
                );
            }
            Err(err @ ResolveError::Missing { .. }) => {
                warn!(policy = %policy.name, %err, "skipping policy with dangling reference");
                unresolved.insert(policy.uid.clone());
                report.skipped.push(SkippedItem {
                    kind: "policy".to_string(),
                    name: policy.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    for group in &groups {
        let cyclic = detect_membership_cycles(store, &group.uid);
        report.cyclic_groups.extend(cyclic);
    }
    report.cyclic_groups.sort();
    report.cyclic_groups.dedup();

    let transformer = Transformer::new(store, &opts.zone_map);
    emit_objects(&transformer, target, &target_container, &objects, &mut report);
    emit_groups(&transformer, target, &target_container, &groups, &mut report);

    for policy in &policies {
        // A policy whose reference set failed to resolve is already in
        // the skip list; emitting its rule would reference objects that
        // were never created on the target.
        if unresolved.contains(&policy.uid) {
            continue;
        }
        if !policy.src_ports.is_empty() {
            warn!(
                policy = %policy.name,
                "target rules have no source-port field, restriction widens to any"
            );
            report.widened_policies.push(policy.name.clone());
        }
        let split = split_icmp(store, policy);
        if split.ping.is_some() {
            report.split_policies.push(policy.name.clone());
        }
        let mut rules = vec![transformer.rule_create(&split.primary)];
        if let Some(ping) = &split.ping {
            rules.push(transformer.rule_create(ping));
        }
        for rule in rules {
            let name = rule.name.clone();
            match target.create_security_rule(&target_container, rule) {
                Ok(()) => report.rules += 1,
                Err(err) => skip(&mut report, "security-rule", &name, &err),
            }
        }
    }

    if opts.with_nat {
        migrate_nat(store, target, opts, &transformer, &mut report)?;
    }

    info!(
        container = %report.container,
        rules = report.rules,
        addresses = report.addresses,
        services = report.services,
        "migration complete"
    );
    Ok(report)
}

fn emit_objects(
    transformer: &Transformer<'_>,
    target: &mut dyn TargetConnector,
    container: &str,
    objects: &[Rc<CanonicalObject>],
    report: &mut MigrationReport,
) {
    for object in objects {
        match object.kind {
            ObjectKind::Network | ObjectKind::Geolocation => {
                let Some(create) = transformer.address_create(object) else {
                    // Geolocation and valueless rows have no address shape;
                    // their names pass straight into rules.
                    continue;
                };
                let name = create.name.clone();
                match target.create_address(container, create) {
                    Ok(()) => report.addresses += 1,
                    Err(err) => skip(report, "address", &name, &err),
                }
            }
            ObjectKind::Port => {
                let Some(create) = transformer.service_create(object) else {
                    continue;
                };
                let name = create.name.clone();
                match target.create_service(container, create) {
                    Ok(()) => report.services += 1,
                    Err(err) => skip(report, "service", &name, &err),
                }
            }
            ObjectKind::Url => {
                let Some(create) = transformer.url_category_for_object(object) else {
                    continue;
                };
                let name = create.name.clone();
                match target.create_url_category(container, create) {
                    Ok(()) => report.url_categories += 1,
                    Err(err) => skip(report, "url-category", &name, &err),
                }
            }
            // ICMP objects surface as the ping application, everything
            // else rides on the rule by name.
            _ => {}
        }
    }
}

fn emit_groups(
    transformer: &Transformer<'_>,
    target: &mut dyn TargetConnector,
    container: &str,
    groups: &[Rc<CanonicalObject>],
    report: &mut MigrationReport,
) {
    for group in groups {
        match group.kind {
            ObjectKind::NetworkGroup => {
                let create = transformer.address_group_create(group);
                let name = create.name.clone();
                match target.create_address_group(container, create) {
                    Ok(()) => report.address_groups += 1,
                    Err(err) => skip(report, "address-group", &name, &err),
                }
            }
            ObjectKind::PortGroup => {
                let Some(create) = transformer.service_group_create(group) else {
                    info!(group = %group.name, "service group empty after ICMP strip, not created");
                    continue;
                };
                let name = create.name.clone();
                match target.create_service_group(container, create) {
                    Ok(()) => report.service_groups += 1,
                    Err(err) => skip(report, "service-group", &name, &err),
                }
            }
            ObjectKind::UrlGroup => {
                let create = transformer.url_category_for_group(group);
                let name = create.name.clone();
                match target.create_url_category(container, create) {
                    Ok(()) => report.url_categories += 1,
                    Err(err) => skip(report, "url-category", &name, &err),
                }
            }
            _ => {}
        }
    }
}

fn migrate_nat(
    store: &Store,
    target: &mut dyn TargetConnector,
    opts: &MigrateOptions,
    transformer: &Transformer<'_>,
    report: &mut MigrationReport,
) -> Result<(), MigrateError> {
    let Some(container) =
        store.container_by_name(&opts.device_uid, ContainerKind::NatPolicy, &opts.container)
    else {
        // No NAT container of that name; nothing to do.
        return Ok(());
    };
    for policy in store.nat_policies_in(&container.uid) {
        let create = transformer.nat_rule_create(policy);
        let name = create.name.clone();
        match target.create_nat_rule(&report.target_container.clone(), create) {
            Ok(()) => report.nat_rules += 1,
            Err(err) => skip(report, "nat-rule", &name, &err),
        }
    }
    Ok(())
}

fn skip(report: &mut MigrationReport, kind: &str, name: &str, err: &ConnectorError) {
    error!(kind, name, %err, "target rejected item, continuing");
    report.skipped.push(SkippedItem {
        kind: kind.to_string(),
        name: name.to_string(),
        reason: err.to_string(),
    });
}

/// Render a migration report for the terminal.
pub fn render_migration_text(report: &MigrationReport) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "migrate container={} target={}",
        report.container, report.target_container
    ));
    out.push(format!(
        "created addresses={} services={} url_categories={} address_groups={} service_groups={} rules={} nat_rules={}",
        report.addresses,
        report.services,
        report.url_categories,
        report.address_groups,
        report.service_groups,
        report.rules,
        report.nat_rules
    ));
    for name in &report.split_policies {
        out.push(format!("- {} {name}", "SPLIT".yellow()));
    }
    for name in &report.cyclic_groups {
        out.push(format!("- {} cyclic group membership: {name}", "WARN".yellow()));
    }
    for name in &report.widened_policies {
        out.push(format!(
            "- {} source-port restriction of '{name}' widens to any",
            "WARN".yellow()
        ));
    }
    for item in &report.skipped {
        out.push(format!(
            "- {} {} '{}': {}",
            "SKIP".red(),
            item.kind,
            item.name,
            item.reason
        ));
    }
    if report.skipped.is_empty() {
        out.push(format!("{}", "no items skipped".green()));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use canon_store::{
        CanonicalObject, Container, NetworkType, ObjectValue, PolicyAction, SecurityPolicy,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::connector::Recorder;

    fn seed_store() -> Store {
        let mut store = Store::new();
        store
            .insert_container(Container::new("oc", "objects", ContainerKind::Object, "dev"))
            .unwrap();
        store
            .insert_container(Container::new(
                "pc",
                "branch",
                ContainerKind::SecurityPolicy,
                "dev",
            ))
            .unwrap();
        store
    }

    fn add_object(
        store: &mut Store,
        uid: &str,
        name: &str,
        kind: ObjectKind,
        value: ObjectValue,
    ) -> ObjectRef {
        store
            .insert_object(CanonicalObject {
                uid: uid.into(),
                name: name.to_string(),
                kind,
                container_uid: "oc".into(),
                description: String::new(),
                overridable: false,
                value,
            })
            .unwrap();
        ObjectRef::new(uid, name, kind)
    }

    fn base_policy(uid: &str, name: &str, position: u32) -> SecurityPolicy {
        SecurityPolicy {
            uid: uid.into(),
            name: name.to_string(),
            container_uid: "pc".into(),
            position,
            enabled: true,
            action: PolicyAction::Allow,
            section: None,
            log_begin: false,
            log_end: false,
            src_zones: vec![ObjectRef::new("z-1", "Z1", ObjectKind::Zone)],
            dst_zones: vec![],
            src_networks: vec![],
            dst_networks: vec![],
            src_ports: vec![],
            dst_ports: vec![],
            users: vec![],
            urls: vec![],
            applications: vec![],
            schedule: None,
        }
    }

    fn options() -> MigrateOptions {
        MigrateOptions {
            device_uid: Uid::new("dev"),
            container: "branch".to_string(),
            target_container: None,
            zone_map: BTreeMap::new(),
            with_nat: false,
        }
    }

    #[test]
    fn icmp_bearing_policy_migrates_as_two_rules() {
        let mut store = seed_store();
        let tcp = add_object(
            &mut store,
            "o-tcp",
            "TCP-80",
            ObjectKind::Port,
            ObjectValue::Port {
                protocol: "tcp".to_string(),
                number: Some("80".to_string()),
            },
        );
        let ping = add_object(
            &mut store,
            "o-ping",
            "PING-ANY",
            ObjectKind::Icmp,
            ObjectValue::Icmp {
                icmp_type: None,
                code: None,
            },
        );
        let mut policy = base_policy("p-1", "P", 1);
        policy.dst_ports = vec![tcp, ping];
        store.insert_security_policy(policy).unwrap();

        let mut recorder = Recorder::new();
        let report = migrate_container(&store, &mut recorder, &options()).unwrap();

        assert_eq!(report.rules, 2);
        assert_eq!(report.split_policies, vec!["P"]);
        // One service created for TCP-80; the ICMP object creates nothing.
        assert_eq!(report.services, 1);

        assert_eq!(recorder.rules.len(), 2);
        let primary = &recorder.rules[0];
        assert_eq!(primary.name, "P");
        assert_eq!(primary.services, vec!["TCP-80"]);
        assert_eq!(primary.from_zones, vec!["Z1"]);
        assert_eq!(primary.action, "allow");

        let sibling = &recorder.rules[1];
        assert_eq!(sibling.name, "P_ping");
        assert_eq!(sibling.services, vec!["any"]);
        assert_eq!(sibling.applications, vec!["ping"]);
        assert_eq!(sibling.from_zones, vec!["Z1"]);
        assert_eq!(sibling.action, "allow");
    }

    #[test]
    fn shared_object_is_created_exactly_once_across_policies() {
        let mut store = seed_store();
        let host = add_object(
            &mut store,
            "o-h",
            "host-a",
            ObjectKind::Network,
            ObjectValue::Network {
                value: "10.0.0.1/32".to_string(),
                net_type: NetworkType::Host,
            },
        );
        let mut first = base_policy("p-1", "first", 1);
        first.dst_networks = vec![host.clone()];
        let mut second = base_policy("p-2", "second", 2);
        second.dst_networks = vec![host];
        store.insert_security_policy(first).unwrap();
        store.insert_security_policy(second).unwrap();

        let mut recorder = Recorder::new();
        let report = migrate_container(&store, &mut recorder, &options()).unwrap();
        assert_eq!(report.addresses, 1);
        assert_eq!(recorder.addresses.len(), 1);
        assert_eq!(report.rules, 2);
    }

    #[test]
    fn missing_target_container_is_fatal() {
        let mut store = seed_store();
        store
            .insert_security_policy(base_policy("p-1", "only", 1))
            .unwrap();
        let mut recorder = Recorder::new();
        recorder.known_containers = Some(std::collections::BTreeSet::new());
        let err = migrate_container(&store, &mut recorder, &options()).unwrap_err();
        assert!(matches!(err, MigrateError::TargetContainerMissing { .. }));
    }

    #[test]
    fn rejected_rule_is_skipped_and_the_batch_continues() {
        let mut store = seed_store();
        store
            .insert_security_policy(base_policy("p-1", "bad rule", 1))
            .unwrap();
        store
            .insert_security_policy(base_policy("p-2", "good rule", 2))
            .unwrap();
        let mut recorder = Recorder::new();
        recorder.fail_names.insert("bad rule".to_string());

        let report = migrate_container(&store, &mut recorder, &options()).unwrap();
        assert_eq!(report.rules, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "bad rule");
        assert_eq!(recorder.rules[0].name, "good rule");
    }

    #[test]
    fn policy_with_dangling_reference_is_skipped_not_emitted() {
        let mut store = seed_store();
        let host = add_object(
            &mut store,
            "o-h",
            "host-a",
            ObjectKind::Network,
            ObjectValue::Network {
                value: "10.0.0.1/32".to_string(),
                net_type: NetworkType::Host,
            },
        );
        let mut dangling = base_policy("p-1", "dangling", 1);
        dangling.dst_networks =
            vec![ObjectRef::new("o-ghost", "ghost", ObjectKind::Network)];
        let mut good = base_policy("p-2", "good", 2);
        good.dst_networks = vec![host];
        store.insert_security_policy(dangling).unwrap();
        store.insert_security_policy(good).unwrap();

        let mut recorder = Recorder::new();
        let report = migrate_container(&store, &mut recorder, &options()).unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind, "policy");
        assert_eq!(report.skipped[0].name, "dangling");
        // The skipped policy produces no rule; only the resolvable one does.
        assert_eq!(report.rules, 1);
        assert_eq!(recorder.rules.len(), 1);
        assert_eq!(recorder.rules[0].name, "good");
    }

    #[test]
    fn source_port_restriction_is_reported_as_widened() {
        let mut store = seed_store();
        let tcp = add_object(
            &mut store,
            "o-tcp",
            "TCP-1024",
            ObjectKind::Port,
            ObjectValue::Port {
                protocol: "tcp".to_string(),
                number: Some("1024".to_string()),
            },
        );
        let mut policy = base_policy("p-1", "from-high-ports", 1);
        policy.src_ports = vec![tcp];
        store.insert_security_policy(policy).unwrap();

        let mut recorder = Recorder::new();
        let report = migrate_container(&store, &mut recorder, &options()).unwrap();

        assert_eq!(report.widened_policies, vec!["from-high-ports"]);
        assert_eq!(report.rules, 1);
        // The source-port object still migrates as a service row.
        assert_eq!(report.services, 1);
        assert_eq!(recorder.rules[0].services, vec!["any"]);
    }

    #[test]
    fn unknown_source_container_is_fatal() {
        let store = seed_store();
        let mut recorder = Recorder::new();
        let mut opts = options();
        opts.container = "ghost".to_string();
        let err = migrate_container(&store, &mut recorder, &opts).unwrap_err();
        assert!(matches!(err, MigrateError::UnknownContainer { .. }));
    }
}
