//! Use-case services over the entity store and the search index.
//!
//! # Responsibility
//! - `sync_service`: every mutation, store first then index.
//! - `query_service`: exact reads, listings and search.
//! - Keep transport layers decoupled from storage details.

pub mod error;
pub mod query_service;
pub mod sync_service;
