use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::container::{Container, ContainerKind};
use crate::device::ManagedDevice;
use crate::ids::Uid;
use crate::object::CanonicalObject;
use crate::policy::{NatPolicy, SecurityPolicy};

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} row '{name}' references missing {referenced} {uid}")]
    ForeignKey {
        table: &'static str,
        name: String,
        referenced: &'static str,
        uid: Uid,
    },
    #[error("container {uid} not found")]
    MissingContainer { uid: Uid },
    #[error("object {uid} is not a group")]
    NotAGroup { uid: Uid },
    #[error("setting parent of container '{name}' would create a cycle")]
    ParentCycle { name: String },
}

/// Table-per-entity relational store for the canonical schema.
///
/// Every `insert_*` method has upsert-ignore semantics: a row whose primary
/// key or unique key already exists is skipped and the method returns
/// `Ok(false)`. Foreign keys from objects/policies/devices to their
/// container, and from membership rows to their group and member, are
/// enforced at insert time.
#[derive(Debug, Default)]
pub struct Store {
    containers: BTreeMap<Uid, Container>,
    objects: BTreeMap<Uid, CanonicalObject>,
    /// (group uid, concrete member uid) join rows.
    object_members: BTreeSet<(Uid, Uid)>,
    /// (group uid, subgroup uid) join rows.
    group_members: BTreeSet<(Uid, Uid)>,
    security_policies: BTreeMap<Uid, SecurityPolicy>,
    nat_policies: BTreeMap<Uid, NatPolicy>,
    devices: BTreeMap<Uid, ManagedDevice>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Insert a container row. Unique on uid and on (device, kind, name).
    pub fn insert_container(&mut self, row: Container) -> Result<bool, StoreError> {
        if self.containers.contains_key(&row.uid)
            || self
                .container_by_name(&row.device_uid, row.kind, &row.name)
                .is_some()
        {
            return Ok(false);
        }
        self.containers.insert(row.uid.clone(), row);
        Ok(true)
    }

    /// Rewire a container's parent pointer after all siblings exist.
    ///
    /// Rejects self-parenting and any assignment that would close a cycle in
    /// the parent chain.
    pub fn set_container_parent(&mut self, child: &Uid, parent: &Uid) -> Result<(), StoreError> {
        let child_row = self
            .containers
            .get(child)
            .ok_or_else(|| StoreError::MissingContainer { uid: child.clone() })?;
        let name = child_row.name.clone();
        if !self.containers.contains_key(parent) {
            return Err(StoreError::MissingContainer {
                uid: parent.clone(),
            });
        }
        // Walk up from the proposed parent; reaching the child again means
        // the assignment would close a loop.
        let mut cursor = Some(parent.clone());
        while let Some(uid) = cursor {
            if uid == *child {
                return Err(StoreError::ParentCycle { name });
            }
            cursor = self.containers.get(&uid).and_then(|c| c.parent.clone());
        }
        if let Some(row) = self.containers.get_mut(child) {
            row.parent = Some(parent.clone());
        }
        Ok(())
    }

    pub fn container(&self, uid: &Uid) -> Option<&Container> {
        self.containers.get(uid)
    }

    pub fn container_by_name(
        &self,
        device_uid: &Uid,
        kind: ContainerKind,
        name: &str,
    ) -> Option<&Container> {
        self.containers
            .values()
            .find(|c| c.device_uid == *device_uid && c.kind == kind && c.name == name)
    }

    /// All containers of one kind on one device, name-ordered.
    pub fn containers_for_device(&self, device_uid: &Uid, kind: ContainerKind) -> Vec<&Container> {
        let mut rows: Vec<&Container> = self
            .containers
            .values()
            .filter(|c| c.device_uid == *device_uid && c.kind == kind)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Insert an object row. Unique on uid and on (container, kind, name).
    pub fn insert_object(&mut self, row: CanonicalObject) -> Result<bool, StoreError> {
        if !self.containers.contains_key(&row.container_uid) {
            return Err(StoreError::ForeignKey {
                table: "objects",
                name: row.name,
                referenced: "container",
                uid: row.container_uid,
            });
        }
        if self.objects.contains_key(&row.uid)
            || self.objects.values().any(|o| {
                o.container_uid == row.container_uid && o.kind == row.kind && o.name == row.name
            })
        {
            return Ok(false);
        }
        self.objects.insert(row.uid.clone(), row);
        Ok(true)
    }

    pub fn object(&self, uid: &Uid) -> Option<&CanonicalObject> {
        self.objects.get(uid)
    }

    pub fn object_by_name(&self, container_uid: &Uid, name: &str) -> Option<&CanonicalObject> {
        self.objects
            .values()
            .find(|o| o.container_uid == *container_uid && o.name == name)
    }

    /// All objects in a container, name-ordered.
    pub fn objects_in(&self, container_uid: &Uid) -> Vec<&CanonicalObject> {
        let mut rows: Vec<&CanonicalObject> = self
            .objects
            .values()
            .filter(|o| o.container_uid == *container_uid)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Insert a (group, concrete object) membership row.
    pub fn insert_object_member(&mut self, group: &Uid, member: &Uid) -> Result<bool, StoreError> {
        self.check_membership_fk(group, member)?;
        Ok(self
            .object_members
            .insert((group.clone(), member.clone())))
    }

    /// Insert a (group, subgroup) membership row.
    pub fn insert_group_member(&mut self, group: &Uid, subgroup: &Uid) -> Result<bool, StoreError> {
        self.check_membership_fk(group, subgroup)?;
        Ok(self
            .group_members
            .insert((group.clone(), subgroup.clone())))
    }

    fn check_membership_fk(&self, group: &Uid, member: &Uid) -> Result<(), StoreError> {
        let group_row = self
            .objects
            .get(group)
            .ok_or_else(|| StoreError::ForeignKey {
                table: "group_members",
                name: group.to_string(),
                referenced: "group",
                uid: group.clone(),
            })?;
        if !group_row.kind.is_group() {
            return Err(StoreError::NotAGroup { uid: group.clone() });
        }
        if !self.objects.contains_key(member) {
            return Err(StoreError::ForeignKey {
                table: "group_members",
                name: group_row.name.clone(),
                referenced: "member",
                uid: member.clone(),
            });
        }
        Ok(())
    }

    /// Direct concrete members of a group, joined to object rows, name-ordered.
    pub fn object_members(&self, group: &Uid) -> Vec<&CanonicalObject> {
        self.join_members(&self.object_members, group)
    }

    /// Direct subgroup members of a group, joined to object rows, name-ordered.
    pub fn group_members(&self, group: &Uid) -> Vec<&CanonicalObject> {
        self.join_members(&self.group_members, group)
    }

    fn join_members(
        &self,
        table: &BTreeSet<(Uid, Uid)>,
        group: &Uid,
    ) -> Vec<&CanonicalObject> {
        let mut rows: Vec<&CanonicalObject> = table
            .iter()
            .filter(|(g, _)| g == group)
            .filter_map(|(_, m)| self.objects.get(m))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Insert a security policy. Unique on uid and on (container, position).
    pub fn insert_security_policy(&mut self, row: SecurityPolicy) -> Result<bool, StoreError> {
        if !self.containers.contains_key(&row.container_uid) {
            return Err(StoreError::ForeignKey {
                table: "security_policies",
                name: row.name,
                referenced: "container",
                uid: row.container_uid,
            });
        }
        if self.security_policies.contains_key(&row.uid)
            || self
                .security_policies
                .values()
                .any(|p| p.container_uid == row.container_uid && p.position == row.position)
        {
            return Ok(false);
        }
        self.security_policies.insert(row.uid.clone(), row);
        Ok(true)
    }

    /// Security policies of a container, position-ordered.
    pub fn security_policies_in(&self, container_uid: &Uid) -> Vec<&SecurityPolicy> {
        let mut rows: Vec<&SecurityPolicy> = self
            .security_policies
            .values()
            .filter(|p| p.container_uid == *container_uid)
            .collect();
        rows.sort_by_key(|p| p.position);
        rows
    }

    /// Insert a NAT policy. Unique on uid and on (container, position).
    pub fn insert_nat_policy(&mut self, row: NatPolicy) -> Result<bool, StoreError> {
        if !self.containers.contains_key(&row.container_uid) {
            return Err(StoreError::ForeignKey {
                table: "nat_policies",
                name: row.name,
                referenced: "container",
                uid: row.container_uid,
            });
        }
        if self.nat_policies.contains_key(&row.uid)
            || self
                .nat_policies
                .values()
                .any(|p| p.container_uid == row.container_uid && p.position == row.position)
        {
            return Ok(false);
        }
        self.nat_policies.insert(row.uid.clone(), row);
        Ok(true)
    }

    /// NAT policies of a container, position-ordered.
    pub fn nat_policies_in(&self, container_uid: &Uid) -> Vec<&NatPolicy> {
        let mut rows: Vec<&NatPolicy> = self
            .nat_policies
            .values()
            .filter(|p| p.container_uid == *container_uid)
            .collect();
        rows.sort_by_key(|p| p.position);
        rows
    }

    /// Insert a managed device. Unique on uid and on (container, name).
    pub fn insert_device(&mut self, row: ManagedDevice) -> Result<bool, StoreError> {
        if !self.containers.contains_key(&row.container_uid) {
            return Err(StoreError::ForeignKey {
                table: "managed_devices",
                name: row.name,
                referenced: "container",
                uid: row.container_uid,
            });
        }
        if self.devices.contains_key(&row.uid)
            || self
                .devices
                .values()
                .any(|d| d.container_uid == row.container_uid && d.name == row.name)
        {
            return Ok(false);
        }
        self.devices.insert(row.uid.clone(), row);
        Ok(true)
    }

    pub fn device(&self, uid: &Uid) -> Option<&ManagedDevice> {
        self.devices.get(uid)
    }

    /// Managed devices of a container, name-ordered.
    pub fn devices_in(&self, container_uid: &Uid) -> Vec<&ManagedDevice> {
        let mut rows: Vec<&ManagedDevice> = self
            .devices
            .values()
            .filter(|d| d.container_uid == *container_uid)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }
}
