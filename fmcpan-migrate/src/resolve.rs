//! Transitive resolution of policy object references.
//!
//! Given the objects and groups a policy references directly, this module
//! computes the full set of concrete objects and nested groups reachable
//! through group membership. A process-scoped identity cache keyed by
//! (UID, name) guarantees one materialized instance per distinct object no
//! matter how many policies, flows, or membership paths reach it; the same
//! [`ResolutionContext`] is shared across every reference set of a
//! migration run so each object is migrated exactly once.
//!
//! Expansion is an explicit frontier walk with a processed set rather than
//! recursion: complexity is linear in the number of membership edges and
//! cyclic vendor data terminates with each node visited once.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use canon_store::{CanonicalObject, Identity, ObjectRef, Store, Uid};
use thiserror::Error;
use tracing::warn;

/// Errors raised during closure computation.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("referenced object '{name}' ({uid}) is not in the canonical store")]
    Missing { uid: Uid, name: String },
}

/// Result of expanding one set of references: every concrete object and
/// every group reachable, each at most once, in first-reached order.
#[derive(Debug, Default)]
pub struct Closure {
    pub objects: Vec<Rc<CanonicalObject>>,
    pub groups: Vec<Rc<CanonicalObject>>,
}

/// Identity cache and processed-group set for one resolution pass.
///
/// Construct once per migration run and pass to every resolution call;
/// nothing here is global. Not safe for concurrent mutation.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    cache: HashMap<Identity, Rc<CanonicalObject>>,
    processed: HashSet<Identity>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        ResolutionContext::default()
    }

    /// Look up or materialize the instance for an identity.
    ///
    /// Two calls with the same (UID, name) return clones of the same `Rc`,
    /// never two copies of the object.
    pub fn materialize(
        &mut self,
        store: &Store,
        reference: &ObjectRef,
    ) -> Result<Rc<CanonicalObject>, ResolveError> {
        let identity = reference.identity();
        if let Some(instance) = self.cache.get(&identity) {
            return Ok(Rc::clone(instance));
        }
        let row = store.object(&reference.uid).ok_or_else(|| ResolveError::Missing {
            uid: reference.uid.clone(),
            name: reference.name.clone(),
        })?;
        let instance = Rc::new(row.clone());
        self.cache.insert(identity, Rc::clone(&instance));
        Ok(instance)
    }

    fn materialize_row(&mut self, row: &CanonicalObject) -> Rc<CanonicalObject> {
        let identity = row.identity();
        if let Some(instance) = self.cache.get(&identity) {
            return Rc::clone(instance);
        }
        let instance = Rc::new(row.clone());
        self.cache.insert(identity, Rc::clone(&instance));
        instance
    }

    /// Expand a reference set into its full closure.
    ///
    /// Concrete references land in `objects` directly; group references
    /// seed a frontier that is drained group by group, fetching each
    /// group's direct object and subgroup members from the store. A group
    /// already processed earlier in this context contributes nothing new,
    /// which both avoids rework and bounds cyclic membership graphs.
    pub fn resolve(
        &mut self,
        store: &Store,
        references: &[ObjectRef],
    ) -> Result<Closure, ResolveError> {
        let mut closure = Closure::default();
        let mut in_objects: HashSet<Identity> = HashSet::new();
        let mut in_groups: HashSet<Identity> = HashSet::new();
        let mut frontier: Vec<Rc<CanonicalObject>> = Vec::new();

        for reference in references {
            let instance = self.materialize(store, reference)?;
            if instance.kind.is_group() {
                if in_groups.insert(instance.identity()) {
                    closure.groups.push(Rc::clone(&instance));
                    frontier.push(instance);
                }
            } else if in_objects.insert(instance.identity()) {
                closure.objects.push(instance);
            }
        }

        while let Some(group) = frontier.pop() {
            let identity = group.identity();
            if !self.processed.insert(identity) {
                continue;
            }
            for row in store.object_members(&group.uid) {
                let instance = self.materialize_row(row);
                if in_objects.insert(instance.identity()) {
                    closure.objects.push(instance);
                }
            }
            for row in store.group_members(&group.uid) {
                let instance = self.materialize_row(row);
                if in_groups.insert(instance.identity()) {
                    closure.groups.push(Rc::clone(&instance));
                    frontier.push(instance);
                }
            }
        }
        Ok(closure)
    }
}

/// Scan a group's membership graph for cycles.
///
/// The source platform never validates acyclicity of vendor-supplied group
/// graphs; resolution tolerates cycles (visited-once), but migration warns
/// about them since a cyclic group cannot mean what its author intended.
/// Returns the names of groups found on a cycle reachable from `root`.
pub fn detect_membership_cycles(store: &Store, root: &Uid) -> Vec<String> {
    let mut on_path: Vec<Uid> = Vec::new();
    let mut finished: HashSet<Uid> = HashSet::new();
    let mut cyclic: Vec<String> = Vec::new();
    walk(store, root, &mut on_path, &mut finished, &mut cyclic);
    cyclic.sort();
    cyclic.dedup();
    if !cyclic.is_empty() {
        warn!(groups = ?cyclic, "cyclic group membership detected");
    }
    cyclic
}

fn walk(
    store: &Store,
    group: &Uid,
    on_path: &mut Vec<Uid>,
    finished: &mut HashSet<Uid>,
    cyclic: &mut Vec<String>,
) {
    if finished.contains(group) {
        return;
    }
    if on_path.contains(group) {
        if let Some(row) = store.object(group) {
            cyclic.push(row.name.clone());
        }
        return;
    }
    on_path.push(group.clone());
    for member in store.group_members(group) {
        walk(store, &member.uid, on_path, finished, cyclic);
    }
    on_path.pop();
    finished.insert(group.clone());
}
