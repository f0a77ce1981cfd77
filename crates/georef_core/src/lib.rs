//! Core of the geographic reference-data registry.
//!
//! The entity store is authoritative; the search index is a denormalized
//! copy kept eventually consistent by [`SyncService`].

pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod model;
pub mod schema;
pub mod service;
pub mod store;

pub use config::{ConfigError, RegistryConfig};
pub use db::{
    open_index_db, open_index_db_in_memory, open_store_db, open_store_db_in_memory, DbError,
    DbResult,
};
pub use index::fts::{IndexError, SearchHit, SearchIndex, SqliteSearchIndex};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LogTarget};
pub use model::entity::{Entity, EntityId, FieldValue};
pub use model::page::{Page, PageRequest, SortDirection, SortOrder};
pub use model::patch::EntityPatch;
pub use model::validation::ValidationError;
pub use schema::EntityKind;
pub use service::error::{ServiceError, ServiceResult};
pub use service::query_service::{PageLimits, QueryService, SearchQuery};
pub use service::sync_service::{ReconcileReport, ReindexOutcome, SyncService};
pub use store::drift::{DriftLedger, DriftOperation, DriftRecord};
pub use store::entity_store::{EntityStore, SqliteEntityStore, StoreError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
