//! Domain records shared by the store, the index and the services.
//!
//! # Responsibility
//! - Define the generic entity shape driven by `schema` descriptors.
//! - Define merge-patch input and pagination envelopes.
//!
//! # Invariants
//! - An entity's `id` is assigned by the store and absent before insertion.
//! - Field maps never hold nulls: absence is the only "no value" state.

pub mod entity;
pub mod page;
pub mod patch;
pub mod validation;
