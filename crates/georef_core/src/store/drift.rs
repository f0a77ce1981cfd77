//! Drift ledger: reconciliation obligations between store and index.
//!
//! # Responsibility
//! - Durably remember entities whose index projection failed to follow a
//!   committed store write.
//! - Let maintenance list and clear those obligations.
//!
//! # Invariants
//! - At most one pending obligation per `(kind, entity_id)`; the latest
//!   failure wins.
//! - Obligations never block writes; they are only read by maintenance.

use crate::model::entity::EntityId;
use crate::schema::EntityKind;
use crate::store::entity_store::{SqliteEntityStore, StoreError, StoreResult};
use rusqlite::{params, Row};

/// Index operation that failed after the store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftOperation {
    Put,
    Delete,
}

impl DriftOperation {
    fn as_db(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One pending reconciliation obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftRecord {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    pub operation: DriftOperation,
    /// Sanitized index error text.
    pub reason: String,
    /// Epoch milliseconds of the latest failure.
    pub recorded_at: i64,
}

/// Ledger interface used by the sync service.
pub trait DriftLedger {
    fn record_drift(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        operation: DriftOperation,
        reason: &str,
    ) -> StoreResult<()>;
    /// Returns `false` when nothing was pending.
    fn clear_drift(&self, kind: EntityKind, entity_id: EntityId) -> StoreResult<bool>;
    /// Oldest obligations first.
    fn pending_drift(&self) -> StoreResult<Vec<DriftRecord>>;
}

impl DriftLedger for SqliteEntityStore<'_> {
    fn record_drift(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        operation: DriftOperation,
        reason: &str,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO index_drift (kind, entity_id, operation, reason)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (kind, entity_id) DO UPDATE SET
                operation = excluded.operation,
                reason = excluded.reason,
                recorded_at = (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER));",
            params![kind.as_str(), entity_id, operation.as_db(), reason],
        )?;
        Ok(())
    }

    fn clear_drift(&self, kind: EntityKind, entity_id: EntityId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM index_drift WHERE kind = ?1 AND entity_id = ?2;",
            params![kind.as_str(), entity_id],
        )?;
        Ok(changed > 0)
    }

    fn pending_drift(&self) -> StoreResult<Vec<DriftRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, entity_id, operation, reason, recorded_at
             FROM index_drift
             ORDER BY recorded_at ASC, kind ASC, entity_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_drift_row(row)?);
        }
        Ok(records)
    }
}

fn parse_drift_row(row: &Row<'_>) -> StoreResult<DriftRecord> {
    let kind_text: String = row.get("kind")?;
    let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid kind `{kind_text}` in index_drift.kind"))
    })?;

    let operation_text: String = row.get("operation")?;
    let operation = DriftOperation::parse(&operation_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid operation `{operation_text}` in index_drift.operation"
        ))
    })?;

    Ok(DriftRecord {
        kind,
        entity_id: row.get("entity_id")?,
        operation,
        reason: row.get("reason")?,
        recorded_at: row.get("recorded_at")?,
    })
}
