//! Input validation errors.
//!
//! Every variant is raised before any store or index write happens.

use crate::model::entity::EntityId;
use crate::schema::EntityKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Malformed or contradictory write/read input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Create received an entity that already carries an id.
    IdAlreadySet(EntityId),
    /// Full update received an entity without id.
    IdMissing,
    /// Target id and payload id differ.
    IdMismatch { target: EntityId, payload: EntityId },
    /// Payload kind differs from the targeted kind.
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },
    /// Parent reference does not resolve to a stored row.
    ParentNotFound { kind: EntityKind, id: EntityId },
    /// Field name is not declared by the kind's descriptor.
    UnknownField { kind: EntityKind, field: String },
    /// Field value does not match its declared type.
    FieldTypeMismatch {
        field: String,
        expected: &'static str,
    },
    /// Required field is absent.
    MissingRequiredField {
        kind: EntityKind,
        field: &'static str,
    },
    /// Payload is not a JSON object or has an unreadable `id`.
    MalformedPayload(String),
    /// Page, page size or sort order is out of range.
    BadPagination(String),
    /// Raw full-text expression rejected by the index.
    BadQuery { query: String, message: String },
    /// Parent-scoped listing requested for a kind without parent.
    NoParentRelation(EntityKind),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdAlreadySet(id) => write!(f, "a new entity cannot already have an id ({id})"),
            Self::IdMissing => write!(f, "entity id is missing"),
            Self::IdMismatch { target, payload } => {
                write!(f, "entity id {payload} does not match target id {target}")
            }
            Self::KindMismatch { expected, actual } => {
                write!(f, "expected a `{expected}` entity, got `{actual}`")
            }
            Self::ParentNotFound { kind, id } => write!(f, "parent {kind} {id} not found"),
            Self::UnknownField { kind, field } => write!(f, "`{kind}` has no field `{field}`"),
            Self::FieldTypeMismatch { field, expected } => {
                write!(f, "field `{field}` expects a {expected} value")
            }
            Self::MissingRequiredField { kind, field } => {
                write!(f, "`{kind}` requires field `{field}`")
            }
            Self::MalformedPayload(message) => write!(f, "malformed payload: {message}"),
            Self::BadPagination(message) => write!(f, "bad pagination: {message}"),
            Self::BadQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::NoParentRelation(kind) => write!(f, "`{kind}` has no parent relation"),
        }
    }
}

impl Error for ValidationError {}
