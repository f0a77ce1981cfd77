//! Search index: denormalized, eventually consistent copy of the store.
//!
//! # Responsibility
//! - Map stored entities to index documents (`projection`).
//! - Expose the index driver contract and its SQLite FTS5 implementation (`fts`).
//!
//! # Invariants
//! - Index documents are only ever built from values read back from the store.
//! - The index is disposable: it can be rebuilt from the store at any time.

pub mod fts;
pub mod projection;
