//! Authoritative entity store.
//!
//! # Responsibility
//! - Define the store driver contract consumed by the services.
//! - Persist every kind in its own table through one generic SQLite driver.
//! - Keep the drift ledger next to the data it describes.
//!
//! # Invariants
//! - Ids come from `AUTOINCREMENT` and are never reused within a table.
//! - One entity is written by exactly one SQL statement (per-call atomicity).
//! - Parent columns are not constrained in SQL; dangling references can only
//!   appear through parent deletion.

pub mod drift;
pub mod entity_store;
