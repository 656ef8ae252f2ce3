//! Extraction pipeline: source connector into the canonical store.
//!
//! One pass per source device, sequential: containers (with hierarchy
//! rewire), objects, groups and their membership rows, managed devices,
//! then policies container by container with embedded literals
//! canonicalized on the way in. Every insert is upsert-ignore, so
//! re-running extraction against the same source is a no-op.

use canon_store::{
    CanonicalObject, Container, ContainerKind, ManagedDevice, NatPolicy, ObjectRef, ObjectValue,
    SecurityPolicy, Store, StoreError, Uid,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::connector::{
    ConnectorError, GroupRecord, NatPolicyRecord, ObjectRecord, PolicyRecord, RefRecord,
    SourceConnector,
};
use crate::hierarchy::{materialize_chain, resolve_chain, HierarchyError};
use crate::literal::{
    canonicalize_network_literal, canonicalize_port_literal, canonicalize_url_literal,
    LiteralError,
};

/// Errors that abort an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-run extraction state, constructed once and passed along explicitly.
///
/// Holds the source device UID and the device's object container, which
/// every object without an explicit container lands in.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub device_uid: Uid,
    pub object_container: Uid,
}

impl RunContext {
    /// Resolve the device's object container, synthesizing one when the
    /// source reports none.
    pub fn prepare(store: &mut Store, device_uid: &Uid) -> Result<Self, ExtractError> {
        let existing = store
            .containers_for_device(device_uid, ContainerKind::Object)
            .first()
            .map(|c| c.uid.clone());
        let object_container = match existing {
            Some(uid) => uid,
            None => {
                let uid = Uid::new(format!("{device_uid}-objects"));
                store.insert_container(Container::new(
                    uid.clone(),
                    "objects",
                    ContainerKind::Object,
                    device_uid.clone(),
                ))?;
                uid
            }
        };
        Ok(RunContext {
            device_uid: device_uid.clone(),
            object_container,
        })
    }

    fn container_uid(&self, store: &Store, name: Option<&str>) -> Uid {
        name.and_then(|n| store.container_by_name(&self.device_uid, ContainerKind::Object, n))
            .map(|c| c.uid.clone())
            .unwrap_or_else(|| self.object_container.clone())
    }
}

/// A literal skipped during extraction, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLiteral {
    pub policy: String,
    pub detail: String,
}

/// Counts and leftovers of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub containers: usize,
    pub objects: usize,
    pub groups: usize,
    pub memberships: usize,
    pub devices: usize,
    pub policies: usize,
    pub nat_policies: usize,
    pub skipped_literals: Vec<SkippedLiteral>,
}

impl ExtractReport {
    pub fn render_text(&self) -> String {
        let mut out = vec![format!(
            "extracted containers={} objects={} groups={} memberships={} devices={} policies={} nat={}",
            self.containers,
            self.objects,
            self.groups,
            self.memberships,
            self.devices,
            self.policies,
            self.nat_policies
        )];
        for skipped in &self.skipped_literals {
            out.push(format!(
                "- skipped literal in '{}': {}",
                skipped.policy, skipped.detail
            ));
        }
        out.join("\n")
    }
}

fn to_ref(record: &RefRecord) -> ObjectRef {
    ObjectRef::new(record.uid.as_str(), record.name.as_str(), record.kind)
}

/// Run a full extraction of one source device into the store.
pub fn extract_all(
    store: &mut Store,
    connector: &dyn SourceConnector,
    device_uid: &Uid,
) -> Result<ExtractReport, ExtractError> {
    let mut report = ExtractReport::default();

    for kind in [
        ContainerKind::Object,
        ContainerKind::SecurityPolicy,
        ContainerKind::NatPolicy,
        ContainerKind::Zone,
        ContainerKind::ManagedDevice,
    ] {
        for record in connector.containers(kind)? {
            if store
                .container_by_name(device_uid, kind, &record.name)
                .is_some()
            {
                continue;
            }
            let chain = resolve_chain(connector, store, device_uid, kind, &record.name)?;
            report.containers += chain.len();
            materialize_chain(store, device_uid, kind, &chain)?;
        }
    }

    let ctx = RunContext::prepare(store, device_uid)?;

    for record in connector.objects()? {
        if insert_object_record(store, &ctx, &record)? {
            report.objects += 1;
        }
    }

    let groups = connector.groups()?;
    for group in &groups {
        if insert_group_row(store, &ctx, group)? {
            report.groups += 1;
        }
    }
    // Membership rows go in after every group row exists, so forward
    // references between groups resolve.
    for group in &groups {
        report.memberships += insert_group_members(store, &ctx, group)?;
    }

    report.devices += extract_devices(store, connector, device_uid)?;

    for container in store
        .containers_for_device(device_uid, ContainerKind::SecurityPolicy)
        .iter()
        .map(|c| (c.uid.clone(), c.name.clone()))
        .collect::<Vec<_>>()
    {
        let (container_uid, container_name) = container;
        for record in connector.security_policies(&container_name)? {
            if insert_policy_record(store, &ctx, &container_uid, &record, &mut report)? {
                report.policies += 1;
            }
        }
    }

    for container in store
        .containers_for_device(device_uid, ContainerKind::NatPolicy)
        .iter()
        .map(|c| (c.uid.clone(), c.name.clone()))
        .collect::<Vec<_>>()
    {
        let (container_uid, container_name) = container;
        for record in connector.nat_policies(&container_name)? {
            if insert_nat_record(store, &container_uid, &record)? {
                report.nat_policies += 1;
            }
        }
    }

    info!(
        device = %device_uid,
        objects = report.objects,
        policies = report.policies,
        "extraction complete"
    );
    Ok(report)
}

fn insert_object_record(
    store: &mut Store,
    ctx: &RunContext,
    record: &ObjectRecord,
) -> Result<bool, ExtractError> {
    let container_uid = ctx.container_uid(store, record.container.as_deref());
    let inserted = store.insert_object(CanonicalObject {
        uid: record.uid.as_str().into(),
        name: record.name.clone(),
        kind: record.kind,
        container_uid,
        description: record.description.clone().unwrap_or_default(),
        overridable: record.overridable,
        value: record.value.clone().unwrap_or(ObjectValue::Plain),
    })?;
    Ok(inserted)
}

fn insert_group_row(
    store: &mut Store,
    ctx: &RunContext,
    record: &GroupRecord,
) -> Result<bool, ExtractError> {
    let container_uid = ctx.container_uid(store, record.container.as_deref());
    let inserted = store.insert_object(CanonicalObject {
        uid: record.uid.as_str().into(),
        name: record.name.clone(),
        kind: record.kind,
        container_uid,
        description: record.description.clone().unwrap_or_default(),
        overridable: record.overridable,
        value: ObjectValue::Plain,
    })?;
    Ok(inserted)
}

fn insert_group_members(
    store: &mut Store,
    ctx: &RunContext,
    record: &GroupRecord,
) -> Result<usize, ExtractError> {
    let group_uid: Uid = record.uid.as_str().into();
    let mut inserted = 0;
    for member in &record.objects {
        if store
            .insert_object_member(&group_uid, &member.uid.as_str().into())?
        {
            inserted += 1;
        }
    }
    for subgroup in &record.groups {
        if store
            .insert_group_member(&group_uid, &subgroup.uid.as_str().into())?
        {
            inserted += 1;
        }
    }
    for literal in &record.literals {
        let container_uid = ctx.container_uid(store, record.container.as_deref());
        match canonicalize_network_literal(store, &container_uid, literal) {
            Ok(reference) => {
                if store.insert_object_member(&group_uid, &reference.uid)? {
                    inserted += 1;
                }
            }
            Err(LiteralError::Store(err)) => return Err(err.into()),
            Err(err) => {
                warn!(group = %record.name, %err, "skipping malformed group literal");
            }
        }
    }
    Ok(inserted)
}

fn extract_devices(
    store: &mut Store,
    connector: &dyn SourceConnector,
    device_uid: &Uid,
) -> Result<usize, ExtractError> {
    let records = connector.devices()?;
    if records.is_empty() {
        return Ok(0);
    }
    let container_uid = match store
        .containers_for_device(device_uid, ContainerKind::ManagedDevice)
        .first()
    {
        Some(container) => container.uid.clone(),
        None => {
            let uid = Uid::new(format!("{device_uid}-devices"));
            store.insert_container(Container::new(
                uid.clone(),
                "devices",
                ContainerKind::ManagedDevice,
                device_uid.clone(),
            ))?;
            uid
        }
    };
    let mut inserted = 0;
    for record in records {
        let assigned_policy = record.assigned_policy.as_deref().and_then(|name| {
            store
                .container_by_name(device_uid, ContainerKind::SecurityPolicy, name)
                .map(|c| c.uid.clone())
        });
        if store.insert_device(ManagedDevice {
            uid: record.uid.as_str().into(),
            name: record.name.clone(),
            container_uid: container_uid.clone(),
            hostname: record.hostname.clone(),
            assigned_policy,
            cluster: record.cluster.clone(),
        })? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn insert_policy_record(
    store: &mut Store,
    ctx: &RunContext,
    container_uid: &Uid,
    record: &PolicyRecord,
    report: &mut ExtractReport,
) -> Result<bool, ExtractError> {
    let mut src_networks: Vec<ObjectRef> = record.src_networks.iter().map(to_ref).collect();
    let mut dst_networks: Vec<ObjectRef> = record.dst_networks.iter().map(to_ref).collect();
    let mut src_ports: Vec<ObjectRef> = record.src_ports.iter().map(to_ref).collect();
    let mut dst_ports: Vec<ObjectRef> = record.dst_ports.iter().map(to_ref).collect();
    let mut urls: Vec<ObjectRef> = record.urls.iter().map(to_ref).collect();

    let object_container = ctx.object_container.clone();
    for (literals, refs) in [
        (&record.src_network_literals, &mut src_networks),
        (&record.dst_network_literals, &mut dst_networks),
    ] {
        for literal in literals {
            match canonicalize_network_literal(store, &object_container, literal) {
                Ok(reference) => refs.push(reference),
                Err(LiteralError::Store(err)) => return Err(err.into()),
                Err(err) => skip_literal(report, &record.name, &err),
            }
        }
    }
    for (literals, refs) in [
        (&record.src_port_literals, &mut src_ports),
        (&record.dst_port_literals, &mut dst_ports),
    ] {
        for literal in literals {
            match canonicalize_port_literal(store, &object_container, literal) {
                Ok(reference) => refs.push(reference),
                Err(LiteralError::Store(err)) => return Err(err.into()),
                Err(err) => skip_literal(report, &record.name, &err),
            }
        }
    }
    for url in &record.url_literals {
        match canonicalize_url_literal(store, &object_container, url) {
            Ok(reference) => urls.push(reference),
            Err(LiteralError::Store(err)) => return Err(err.into()),
            Err(err) => skip_literal(report, &record.name, &err),
        }
    }

    let inserted = store.insert_security_policy(SecurityPolicy {
        uid: record.uid.as_str().into(),
        name: record.name.clone(),
        container_uid: container_uid.clone(),
        position: record.position,
        enabled: record.enabled,
        action: record.action,
        section: record.section.clone(),
        log_begin: record.log_begin,
        log_end: record.log_end,
        src_zones: record.src_zones.iter().map(to_ref).collect(),
        dst_zones: record.dst_zones.iter().map(to_ref).collect(),
        src_networks,
        dst_networks,
        src_ports,
        dst_ports,
        users: record.users.iter().map(to_ref).collect(),
        urls,
        applications: record.applications.iter().map(to_ref).collect(),
        schedule: record.schedule.as_ref().map(to_ref),
    })?;
    Ok(inserted)
}

fn skip_literal(report: &mut ExtractReport, policy: &str, err: &LiteralError) {
    warn!(policy, %err, "skipping literal");
    report.skipped_literals.push(SkippedLiteral {
        policy: policy.to_string(),
        detail: err.to_string(),
    });
}

fn insert_nat_record(
    store: &mut Store,
    container_uid: &Uid,
    record: &NatPolicyRecord,
) -> Result<bool, ExtractError> {
    let inserted = store.insert_nat_policy(NatPolicy {
        uid: record.uid.as_str().into(),
        name: record.name.clone(),
        container_uid: container_uid.clone(),
        position: record.position,
        enabled: record.enabled,
        src_zone: record.src_zone.as_ref().map(to_ref),
        dst_zone: record.dst_zone.as_ref().map(to_ref),
        original_source: record.original_source.as_ref().map(to_ref),
        translated_source: record.translated_source.as_ref().map(to_ref),
        original_destination: record.original_destination.as_ref().map(to_ref),
        translated_destination: record.translated_destination.as_ref().map(to_ref),
        service: record.service.as_ref().map(to_ref),
    })?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use canon_store::ObjectKind;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::connector::{
        ContainerRecord, FileSource, NetworkLiteral, PortLiteral, SourceExport,
    };

    fn export_with_one_policy() -> SourceExport {
        SourceExport {
            object_containers: vec![ContainerRecord {
                uid: "oc-1".to_string(),
                name: "global-objects".to_string(),
                parent: None,
            }],
            security_policy_containers: vec![
                ContainerRecord {
                    uid: "pc-1".to_string(),
                    name: "branch".to_string(),
                    parent: Some("global".to_string()),
                },
                ContainerRecord {
                    uid: "pc-0".to_string(),
                    name: "global".to_string(),
                    parent: None,
                },
            ],
            objects: vec![ObjectRecord {
                uid: "o-web".to_string(),
                name: "web-server".to_string(),
                kind: ObjectKind::Network,
                description: None,
                overridable: false,
                container: None,
                value: Some(ObjectValue::Network {
                    value: "10.1.1.10/32".to_string(),
                    net_type: canon_store::NetworkType::Host,
                }),
            }],
            security_policies: [(
                "branch".to_string(),
                vec![PolicyRecord {
                    uid: "p-1".to_string(),
                    name: "allow-web".to_string(),
                    position: 1,
                    enabled: true,
                    action: canon_store::PolicyAction::Allow,
                    section: None,
                    log_begin: false,
                    log_end: false,
                    src_zones: vec![],
                    dst_zones: vec![],
                    src_networks: vec![],
                    src_network_literals: vec![],
                    dst_networks: vec![RefRecord {
                        uid: "o-web".to_string(),
                        name: "web-server".to_string(),
                        kind: ObjectKind::Network,
                    }],
                    dst_network_literals: vec![NetworkLiteral {
                        literal_type: "Host".to_string(),
                        value: "192.0.2.9".to_string(),
                    }],
                    src_ports: vec![],
                    src_port_literals: vec![],
                    dst_ports: vec![],
                    dst_port_literals: vec![PortLiteral {
                        protocol: 6,
                        port: Some("80".to_string()),
                        icmp_type: None,
                        code: None,
                    }],
                    users: vec![],
                    urls: vec![],
                    url_literals: vec![],
                    applications: vec![],
                    schedule: None,
                }],
            )]
            .into_iter()
            .collect(),
            ..SourceExport::default()
        }
    }

    #[test]
    fn extraction_materializes_containers_objects_and_policies() {
        let source = FileSource::from_export(export_with_one_policy());
        let mut store = Store::new();
        let device = Uid::new("src-fmc");
        let report = extract_all(&mut store, &source, &device).unwrap();

        assert_eq!(report.containers, 3);
        assert_eq!(report.objects, 1);
        assert_eq!(report.policies, 1);
        assert!(report.skipped_literals.is_empty());

        let branch = store
            .container_by_name(&device, ContainerKind::SecurityPolicy, "branch")
            .unwrap();
        let global = store
            .container_by_name(&device, ContainerKind::SecurityPolicy, "global")
            .unwrap();
        assert_eq!(branch.parent.as_ref(), Some(&global.uid));

        let policies = store.security_policies_in(&branch.uid.clone());
        assert_eq!(policies.len(), 1);
        let policy = policies[0];
        // Literal canonicalization appended derived objects to the flows.
        assert_eq!(policy.dst_networks.len(), 2);
        assert_eq!(policy.dst_networks[1].name, "NL_192.0.2.9_32");
        assert_eq!(policy.dst_ports.len(), 1);
        assert_eq!(policy.dst_ports[0].name, "PL_tcp_80");
    }

    #[test]
    fn re_extraction_is_idempotent() {
        let source = FileSource::from_export(export_with_one_policy());
        let mut store = Store::new();
        let device = Uid::new("src-fmc");
        extract_all(&mut store, &source, &device).unwrap();
        let second = extract_all(&mut store, &source, &device).unwrap();

        assert_eq!(second.objects, 0);
        assert_eq!(second.policies, 0);
        assert_eq!(second.containers, 0);
    }

    #[test]
    fn unknown_protocol_literal_is_skipped_not_fatal() {
        let mut export = export_with_one_policy();
        export
            .security_policies
            .get_mut("branch")
            .unwrap()[0]
            .dst_port_literals
            .push(PortLiteral {
                protocol: 250,
                port: None,
                icmp_type: None,
                code: None,
            });
        let source = FileSource::from_export(export);
        let mut store = Store::new();
        let report = extract_all(&mut store, &source, &Uid::new("src-fmc")).unwrap();
        assert_eq!(report.policies, 1);
        assert_eq!(report.skipped_literals.len(), 1);
        assert!(report.skipped_literals[0]
            .detail
            .contains("unknown protocol number 250"));
    }
}
