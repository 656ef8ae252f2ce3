//! Firewall configuration migration between heterogeneous management
//! platforms.
//!
//! Source platforms (FMC-style controllers) and target platforms
//! (Panorama-style controllers) expose incompatible object models, naming
//! rules, and policy semantics. This library normalizes extracted source
//! configuration into the vendor-neutral schema of [`canon_store`], then
//! transforms and re-materializes it against the target platform's
//! constraints.
//!
//! # Architecture
//!
//! ## Extraction
//!
//! - [`connector`] — Vendor connector abstractions and record shapes
//! - [`hierarchy`] — Container parent-chain resolution with short-circuit
//!   and cycle guards
//! - [`literal`] — Inline literal (address/port/URL) canonicalization with
//!   deterministic naming
//! - [`protocol`] — IP protocol number to IANA keyword mapping
//! - [`extract`] — Pipeline driving a source connector into the store
//!
//! ## Migration
//!
//! - [`resolve`] — Transitive group-membership closure with identity
//!   deduplication
//! - [`transform`] — Target naming/type constraints, group re-expression,
//!   and the ICMP/ping policy split
//! - [`migrate`] — Pipeline expanding stored policies and emitting target
//!   creation calls
//!
//! ## Tooling
//!
//! - [`project`] — TOML project file (devices, source/target selection,
//!   container and zone mappings)
//!
//! # Workflow
//!
//! 1. **Extract** source containers, objects, groups, and policies into the
//!    canonical store
//! 2. **Resolve** the full object closure of every policy selected for
//!    migration
//! 3. **Transform** names, types, groups, and policy semantics for the
//!    target platform
//! 4. **Emit** creation calls through a target connector and report what
//!    was migrated, split, or skipped

pub mod connector;
pub mod extract;
pub mod hierarchy;
pub mod literal;
pub mod migrate;
pub mod project;
pub mod protocol;
pub mod resolve;
pub mod transform;
