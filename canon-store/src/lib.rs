//! Vendor-neutral canonical schema for firewall configuration, plus the
//! relational store it lives in.
//!
//! Extracted vendor data (containers, network/port/URL objects, groups,
//! zones, managed devices, security and NAT policies) is normalized into the
//! record types defined here before any cross-vendor transformation happens.
//! The [`Store`] provides table-per-entity storage with upsert-ignore insert
//! semantics, unique-constraint checks, and foreign-key enforcement from
//! objects and policies to their owning container.
//!
//! This crate has no vendor knowledge; all platform-specific extraction and
//! transformation lives in higher-level tools built on top of it.

pub mod container;
pub mod device;
pub mod ids;
pub mod object;
pub mod policy;
pub mod store;

pub use container::{Container, ContainerKind};
pub use device::ManagedDevice;
pub use ids::{Identity, Uid};
pub use object::{CanonicalObject, NetworkType, ObjectKind, ObjectValue};
pub use policy::{NatPolicy, ObjectRef, PolicyAction, SecurityPolicy};
pub use store::{Store, StoreError};
