//! Group membership queries used during target re-expression.
//!
//! These walk the stored membership graph directly with a visited set;
//! unlike [`crate::resolve`] they carry no run-wide processed state, so a
//! group answers the same question for every policy that references it.

use std::collections::HashSet;

use canon_store::{CanonicalObject, ObjectKind, Store, Uid};

/// All concrete objects transitively reachable from a group, each once.
pub fn transitive_concrete_members<'a>(store: &'a Store, group: &Uid) -> Vec<&'a CanonicalObject> {
    let mut visited: HashSet<Uid> = HashSet::new();
    let mut seen_objects: HashSet<Uid> = HashSet::new();
    let mut members = Vec::new();
    let mut frontier = vec![group.clone()];
    while let Some(current) = frontier.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        for row in store.object_members(&current) {
            if seen_objects.insert(row.uid.clone()) {
                members.push(row);
            }
        }
        for sub in store.group_members(&current) {
            frontier.push(sub.uid.clone());
        }
    }
    members
}

/// Whether a group transitively contains an ICMP object.
pub fn contains_icmp(store: &Store, group: &Uid) -> bool {
    transitive_concrete_members(store, group)
        .iter()
        .any(|m| m.kind == ObjectKind::Icmp)
}

/// Whether stripping ICMP members would leave the group with nothing.
///
/// A group like this is deleted on the target side and policy references
/// to it fall back to "any".
pub fn empty_after_icmp_strip(store: &Store, group: &Uid) -> bool {
    transitive_concrete_members(store, group)
        .iter()
        .all(|m| m.kind == ObjectKind::Icmp)
}
