//! Container parent-chain resolution.
//!
//! Source platforms arrange policy containers and device groups in an
//! inheritance hierarchy. Extraction walks the chain from a named container
//! up to its root, stopping early when it reaches an ancestor the store
//! already knows (its own ancestors were resolved on a previous climb).
//! Parent pointers are rewired in a second pass once every container of the
//! device is materialized.
//!
//! Vendor data is not trusted to be well formed: the climb is depth-bounded
//! and a name repeating within the current chain is reported as a cycle
//! instead of looping forever.

use canon_store::{Container, ContainerKind, Store, StoreError, Uid};
use thiserror::Error;
use tracing::debug;

use crate::connector::{ConnectorError, ContainerRecord, SourceConnector};

/// Upper bound on the parent-chain climb.
pub const MAX_DEPTH: usize = 64;

/// Errors raised while resolving a container hierarchy. All fatal for the
/// container being resolved.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("container '{name}' could not be resolved on the source")]
    Unresolved { name: String },
    #[error("container hierarchy cycle detected at '{name}'")]
    Cycle { name: String },
    #[error("container hierarchy exceeds {MAX_DEPTH} levels at '{name}'")]
    DepthExceeded { name: String },
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve the ancestor chain of a named container, child first.
///
/// The climb stops after a container that reports no parent, or after one
/// whose parent name the store already holds for this device (the parent's
/// own ancestors are already known). Each record in the returned chain is
/// emitted exactly once.
pub fn resolve_chain(
    connector: &dyn SourceConnector,
    store: &Store,
    device_uid: &Uid,
    kind: ContainerKind,
    name: &str,
) -> Result<Vec<ContainerRecord>, HierarchyError> {
    let mut chain = Vec::new();
    let mut seen = Vec::new();
    let mut current = name.to_string();

    loop {
        if seen.iter().any(|previous| previous == &current) {
            return Err(HierarchyError::Cycle { name: current });
        }
        if seen.len() >= MAX_DEPTH {
            return Err(HierarchyError::DepthExceeded { name: current });
        }
        seen.push(current.clone());

        let record = match connector.container(kind, &current) {
            Ok(record) => record,
            Err(ConnectorError::UnknownContainer { name }) => {
                return Err(HierarchyError::Unresolved { name })
            }
            Err(other) => return Err(other.into()),
        };
        let parent = record.parent.clone();
        chain.push(record);

        match parent {
            None => break,
            Some(parent_name) => {
                if store
                    .container_by_name(device_uid, kind, &parent_name)
                    .is_some()
                {
                    debug!(
                        container = %current,
                        parent = %parent_name,
                        "parent already known, short-circuiting climb"
                    );
                    break;
                }
                current = parent_name;
            }
        }
    }
    Ok(chain)
}

/// Insert a resolved chain into the store, then rewire parent pointers.
///
/// Containers are inserted parentless first so every sibling exists before
/// any parent edge is set; the rewire pass then resolves each parent name
/// to its UID. A parent name that is still unknown after insertion means
/// the chain was truncated by a short-circuit and the edge already exists,
/// or vendor data is inconsistent; both are left to the store's view.
pub fn materialize_chain(
    store: &mut Store,
    device_uid: &Uid,
    kind: ContainerKind,
    chain: &[ContainerRecord],
) -> Result<(), HierarchyError> {
    for record in chain {
        store.insert_container(Container::new(
            record.uid.as_str(),
            record.name.as_str(),
            kind,
            device_uid.clone(),
        ))?;
    }
    for record in chain {
        let Some(parent_name) = &record.parent else {
            continue;
        };
        let child_uid = match store.container_by_name(device_uid, kind, &record.name) {
            Some(row) => row.uid.clone(),
            None => continue,
        };
        let Some(parent_uid) = store
            .container_by_name(device_uid, kind, parent_name)
            .map(|row| row.uid.clone())
        else {
            continue;
        };
        store.set_container_parent(&child_uid, &parent_uid)?;
    }
    Ok(())
}
