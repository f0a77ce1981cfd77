//! Store-then-index write orchestration.
//!
//! # Responsibility
//! - Run create/update/partial-update/delete against the entity store and
//!   propagate the result into the search index.
//! - Validate ids and parent references before the store is touched.
//! - Record and repair store/index drift.
//!
//! # Invariants
//! - Every validation and not-found check happens before any write.
//! - The index only receives values read back from the store.
//! - Once the store write succeeded, the operation reports success; an index
//!   failure becomes a drift obligation, never a rollback.
//! - Nothing is retried inside the service.

use crate::index::fts::{IndexError, SearchIndex};
use crate::index::projection::project;
use crate::logging::sanitize_message;
use crate::model::entity::{Entity, EntityId};
use crate::model::page::SortOrder;
use crate::model::patch::EntityPatch;
use crate::model::validation::ValidationError;
use crate::schema::EntityKind;
use crate::service::error::{ServiceError, ServiceResult};
use crate::store::drift::{DriftLedger, DriftOperation, DriftRecord};
use crate::store::entity_store::{EntityStore, PageWindow};
use log::{error, info, warn};
use std::time::Instant;

const REBUILD_BATCH_SIZE: u64 = 200;
const MAX_DRIFT_REASON_CHARS: usize = 240;

/// Result of re-projecting one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexOutcome {
    /// Store row exists; its projection was written.
    Indexed,
    /// Store row is gone; the index document was removed.
    Removed,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub repaired: usize,
    pub failed: usize,
}

/// Write-side facade over one store and one index.
pub struct SyncService<S, I>
where
    S: EntityStore + DriftLedger,
    I: SearchIndex,
{
    store: S,
    index: I,
}

impl<S, I> SyncService<S, I>
where
    S: EntityStore + DriftLedger,
    I: SearchIndex,
{
    pub fn new(store: S, index: I) -> Self {
        Self { store, index }
    }

    /// Persists a new entity and indexes it.
    ///
    /// # Errors
    /// - `IdAlreadySet` when `entity.id` is set.
    /// - `ParentNotFound` when the parent reference does not resolve.
    pub fn create(&self, entity: Entity) -> ServiceResult<Entity> {
        let started_at = Instant::now();
        let kind = entity.kind;
        if let Some(id) = entity.id {
            return Err(ValidationError::IdAlreadySet(id).into());
        }

        let entity = entity.validated()?;
        self.ensure_parent_exists(&entity)?;

        let id = self.store.insert(&entity).inspect_err(|err| {
            error!(
                "event=entity_create module=sync status=error kind={kind} error_code=store_insert_failed error={err}"
            );
        })?;
        let persisted = self.read_back(kind, id, "created entity not found in read-back")?;
        self.propagate_put(&persisted);

        info!(
            "event=entity_create module=sync status=ok kind={kind} id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(persisted)
    }

    /// Replaces every mutable field of an existing entity.
    ///
    /// # Errors
    /// - `KindMismatch` when the payload is not a `kind` entity.
    /// - `IdMissing` / `IdMismatch` when the payload id is absent or differs.
    /// - `NotFound` when no entity has `id`.
    /// - `ParentNotFound` when the parent reference does not resolve.
    pub fn update(&self, kind: EntityKind, id: EntityId, entity: Entity) -> ServiceResult<Entity> {
        let started_at = Instant::now();
        if entity.kind != kind {
            return Err(ValidationError::KindMismatch {
                expected: kind,
                actual: entity.kind,
            }
            .into());
        }
        match entity.id {
            None => return Err(ValidationError::IdMissing.into()),
            Some(payload) if payload != id => {
                return Err(ValidationError::IdMismatch {
                    target: id,
                    payload,
                }
                .into());
            }
            Some(_) => {}
        }

        let entity = entity.validated()?;
        if !self.store.exists(kind, id)? {
            return Err(ServiceError::NotFound { kind, id });
        }
        self.ensure_parent_exists(&entity)?;

        if !self.store.replace(id, &entity)? {
            return Err(ServiceError::NotFound { kind, id });
        }
        let persisted = self.read_back(kind, id, "updated entity not found in read-back")?;
        self.propagate_put(&persisted);

        info!(
            "event=entity_update module=sync status=ok kind={kind} id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(persisted)
    }

    /// Applies a merge patch to an existing entity.
    ///
    /// Returns `Ok(None)` when the entity disappeared between load and write.
    ///
    /// # Errors
    /// - `IdMismatch` when the patch echoes a different id.
    /// - `NotFound` when no entity has `id`.
    /// - `ParentNotFound` when the patch sets an unresolvable parent.
    pub fn partial_update(
        &self,
        kind: EntityKind,
        id: EntityId,
        patch: &EntityPatch,
    ) -> ServiceResult<Option<Entity>> {
        let started_at = Instant::now();
        if let Some(payload) = patch.id.filter(|payload| *payload != id) {
            return Err(ValidationError::IdMismatch {
                target: id,
                payload,
            }
            .into());
        }

        let current = self
            .store
            .get(kind, id)?
            .ok_or(ServiceError::NotFound { kind, id })?;
        if patch.is_empty() {
            return Ok(Some(current));
        }

        let merged = patch.apply_to(&current).validated()?;
        if patch.touches_parent(kind) {
            self.ensure_parent_exists(&merged)?;
        }

        if !self.store.replace(id, &merged)? {
            warn!(
                "event=entity_patch module=sync status=skipped kind={kind} id={id} reason=vanished"
            );
            return Ok(None);
        }
        let persisted = self.store.get(kind, id)?;
        if let Some(entity) = persisted.as_ref() {
            self.propagate_put(entity);
        }

        info!(
            "event=entity_patch module=sync status=ok kind={kind} id={id} fields={} duration_ms={}",
            patch.fields.len(),
            started_at.elapsed().as_millis()
        );
        Ok(persisted)
    }

    /// Removes an entity from both stores. Missing ids are a no-op success.
    ///
    /// Children referencing the entity are left in place.
    pub fn delete(&self, kind: EntityKind, id: EntityId) -> ServiceResult<()> {
        let removed = self.store.delete(kind, id)?;
        if let Err(err) = self.index.delete(kind, id) {
            self.record_drift(kind, id, DriftOperation::Delete, &err);
        }

        info!("event=entity_delete module=sync status=ok kind={kind} id={id} removed={removed}");
        Ok(())
    }

    /// Re-projects the current store value of one entity into the index.
    ///
    /// # Errors
    /// - `IndexUnavailable` when the index cannot be written.
    pub fn reindex(&self, kind: EntityKind, id: EntityId) -> ServiceResult<ReindexOutcome> {
        let outcome = match self.store.get(kind, id)? {
            Some(entity) => {
                self.index.put(&project(&entity)?)?;
                ReindexOutcome::Indexed
            }
            None => {
                self.index.delete(kind, id)?;
                ReindexOutcome::Removed
            }
        };

        self.store.clear_drift(kind, id)?;
        info!("event=entity_reindex module=sync status=ok kind={kind} id={id} outcome={outcome:?}");
        Ok(outcome)
    }

    /// Lists outstanding drift obligations, oldest first.
    pub fn pending_drift(&self) -> ServiceResult<Vec<DriftRecord>> {
        Ok(self.store.pending_drift()?)
    }

    /// Reindexes every entity with a pending obligation.
    ///
    /// # Errors
    /// - `IndexUnavailable` as soon as the index cannot be reached; already
    ///   repaired entries stay repaired.
    pub fn reconcile(&self) -> ServiceResult<ReconcileReport> {
        let started_at = Instant::now();
        let mut report = ReconcileReport::default();

        for record in self.store.pending_drift()? {
            match self.reindex(record.kind, record.entity_id) {
                Ok(_) => report.repaired += 1,
                Err(ServiceError::IndexUnavailable(message)) => {
                    error!(
                        "event=drift_reconcile module=sync status=error repaired={} error_code=index_unavailable",
                        report.repaired
                    );
                    return Err(ServiceError::IndexUnavailable(message));
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        "event=drift_reconcile module=sync status=entry_failed kind={} id={} error={}",
                        record.kind,
                        record.entity_id,
                        sanitize_message(&err.to_string(), MAX_DRIFT_REASON_CHARS)
                    );
                }
            }
        }

        info!(
            "event=drift_reconcile module=sync status=ok repaired={} failed={} duration_ms={}",
            report.repaired,
            report.failed,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Drops every index document of `kind` and re-projects the store rows.
    ///
    /// Returns the number of indexed entities.
    pub fn rebuild_index(&self, kind: EntityKind) -> ServiceResult<u64> {
        let started_at = Instant::now();
        let removed = self.index.clear(kind)?;

        let mut window = PageWindow {
            offset: 0,
            limit: REBUILD_BATCH_SIZE,
            sort: SortOrder::default(),
            parent: None,
        };
        let mut indexed = 0_u64;
        loop {
            let page = self.store.page(kind, &window)?;
            if page.items.is_empty() {
                break;
            }
            for entity in &page.items {
                self.index.put(&project(entity)?)?;
                if let Some(id) = entity.id {
                    self.store.clear_drift(kind, id)?;
                }
                indexed += 1;
            }
            window.offset += REBUILD_BATCH_SIZE;
        }

        info!(
            "event=index_rebuild module=sync status=ok kind={kind} removed={removed} indexed={indexed} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(indexed)
    }

    fn ensure_parent_exists(&self, entity: &Entity) -> ServiceResult<()> {
        if let Some((parent_kind, parent_id)) = entity.parent_ref() {
            if !self.store.exists(parent_kind, parent_id)? {
                return Err(ValidationError::ParentNotFound {
                    kind: parent_kind,
                    id: parent_id,
                }
                .into());
            }
        }
        Ok(())
    }

    fn read_back(
        &self,
        kind: EntityKind,
        id: EntityId,
        details: &'static str,
    ) -> ServiceResult<Entity> {
        self.store
            .get(kind, id)?
            .ok_or(ServiceError::InconsistentState(details))
    }

    /// Writes the projection; failures become drift, never caller errors.
    fn propagate_put(&self, entity: &Entity) {
        let Some(id) = entity.id else {
            return;
        };
        let result = project(entity)
            .map_err(|err| IndexError::InvalidData(err.to_string()))
            .and_then(|projection| self.index.put(&projection));
        if let Err(err) = result {
            self.record_drift(entity.kind, id, DriftOperation::Put, &err);
        }
    }

    fn record_drift(
        &self,
        kind: EntityKind,
        id: EntityId,
        operation: DriftOperation,
        cause: &IndexError,
    ) {
        let reason = sanitize_message(&cause.to_string(), MAX_DRIFT_REASON_CHARS);
        warn!(
            "event=index_drift module=sync status=recorded kind={kind} id={id} operation={operation:?} reason={reason}"
        );
        if let Err(err) = self.store.record_drift(kind, id, operation, &reason) {
            error!(
                "event=index_drift module=sync status=error kind={kind} id={id} error_code=drift_record_failed error={err}"
            );
        }
    }
}
