//! Service-level error shared by the sync service and the query facade.

use crate::index::fts::IndexError;
use crate::model::entity::EntityId;
use crate::model::validation::ValidationError;
use crate::schema::EntityKind;
use crate::store::entity_store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to transport callers.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before any write.
    Validation(ValidationError),
    /// Operation targets an id that does not exist.
    NotFound { kind: EntityKind, id: EntityId },
    /// Search backend cannot be reached; never degraded to an empty result.
    IndexUnavailable(String),
    /// Entity store failure.
    Store(StoreError),
    /// Index returned unusable data.
    Index(IndexError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::IndexUnavailable(message) => write!(f, "search index unavailable: {message}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Index(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent entity state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Index(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

impl From<IndexError> for ServiceError {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::Unavailable(message) => Self::IndexUnavailable(message),
            IndexError::InvalidQuery { query, message } => {
                Self::Validation(ValidationError::BadQuery { query, message })
            }
            other => Self::Index(other),
        }
    }
}
