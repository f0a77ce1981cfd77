//! Search index contract and SQLite FTS5 implementation.
//!
//! # Responsibility
//! - Store one projection document per `(kind, entity_id)`.
//! - Answer ranked free-text queries with optional equality filters.
//!
//! # Invariants
//! - `put` is an upsert; `delete` of a missing document is a no-op.
//! - Ranked results are ordered by `bm25` then `entity_id`; an empty query
//!   lists every document of the kind by `entity_id`.
//! - Backend failures surface as `IndexError::Unavailable`, never as an
//!   empty result.

use crate::db::migrations::{current_user_version, INDEX_MIGRATIONS};
use crate::index::projection::Projection;
use crate::model::entity::{Entity, EntityId, FieldValue};
use crate::schema::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid term regex"));

/// Result type for index driver APIs.
pub type IndexResult<T> = Result<T, IndexError>;

/// Index driver error.
#[derive(Debug)]
pub enum IndexError {
    /// Backend unreachable or not usable (I/O, lock, missing schema).
    Unavailable(String),
    /// Raw FTS5 expression rejected by the backend.
    InvalidQuery {
        query: String,
        message: String,
    },
    InvalidData(String),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "search index unavailable: {message}"),
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::InvalidData(message) => write!(f, "invalid index document: {message}"),
        }
    }
}

impl Error for IndexError {}

impl From<rusqlite::Error> for IndexError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// Query against one kind's documents.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub kind: EntityKind,
    /// User query text; blank matches every document of the kind.
    pub text: String,
    /// Equality filters on projected fields.
    pub filters: BTreeMap<String, FieldValue>,
    /// Whether to pass text directly as raw FTS5 expression.
    pub raw_fts_syntax: bool,
    pub offset: u64,
    pub limit: u64,
}

impl SearchRequest {
    pub fn new(kind: EntityKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            filters: BTreeMap::new(),
            raw_fts_syntax: false,
            offset: 0,
            limit: 20,
        }
    }
}

/// Single ranked match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entity: Entity,
    /// `bm25` score; lower is better, `0.0` for unranked listings.
    pub rank: f64,
}

/// One window of matches plus the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

/// Index driver interface.
pub trait SearchIndex {
    fn put(&self, projection: &Projection) -> IndexResult<()>;
    fn delete(&self, kind: EntityKind, entity_id: EntityId) -> IndexResult<()>;
    /// Removes every document of `kind`; returns how many were removed.
    fn clear(&self, kind: EntityKind) -> IndexResult<u64>;
    fn get(&self, kind: EntityKind, entity_id: EntityId) -> IndexResult<Option<Projection>>;
    fn query(&self, request: &SearchRequest) -> IndexResult<SearchHits>;
}

/// SQLite FTS5-backed search index.
pub struct SqliteSearchIndex<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSearchIndex<'conn> {
    /// Creates an index over a connection opened with `open_index_db*`.
    pub fn try_new(conn: &'conn Connection) -> IndexResult<Self> {
        let expected = INDEX_MIGRATIONS.latest_version();
        let actual = current_user_version(conn).map_err(|err| {
            IndexError::Unavailable(format!("cannot read index schema version: {err}"))
        })?;
        if actual != expected {
            return Err(IndexError::Unavailable(format!(
                "index requires schema version {expected}, got {actual}"
            )));
        }
        Ok(Self { conn })
    }
}

impl SearchIndex for SqliteSearchIndex<'_> {
    fn put(&self, projection: &Projection) -> IndexResult<()> {
        let document = serde_json::to_string(&projection.document)
            .map_err(|err| IndexError::InvalidData(err.to_string()))?;
        self.conn.execute(
            "INSERT INTO index_documents (kind, entity_id, content, document)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (kind, entity_id) DO UPDATE SET
                content = excluded.content,
                document = excluded.document,
                indexed_at = (CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER));",
            params![
                projection.kind.as_str(),
                projection.entity_id,
                projection.content.as_str(),
                document,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, kind: EntityKind, entity_id: EntityId) -> IndexResult<()> {
        self.conn.execute(
            "DELETE FROM index_documents WHERE kind = ?1 AND entity_id = ?2;",
            params![kind.as_str(), entity_id],
        )?;
        Ok(())
    }

    fn clear(&self, kind: EntityKind) -> IndexResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM index_documents WHERE kind = ?1;",
            [kind.as_str()],
        )?;
        Ok(removed as u64)
    }

    fn get(&self, kind: EntityKind, entity_id: EntityId) -> IndexResult<Option<Projection>> {
        let row = self
            .conn
            .query_row(
                "SELECT entity_id, content, document
                 FROM index_documents
                 WHERE kind = ?1 AND entity_id = ?2;",
                params![kind.as_str(), entity_id],
                |row| {
                    Ok((
                        row.get::<_, EntityId>("entity_id")?,
                        row.get::<_, String>("content")?,
                        row.get::<_, String>("document")?,
                    ))
                },
            )
            .optional()?;

        row.map(|(entity_id, content, document)| -> IndexResult<Projection> {
            Ok(Projection {
                kind,
                entity_id,
                document: parse_document(&document)?,
                content,
            })
        })
        .transpose()
    }

    fn query(&self, request: &SearchRequest) -> IndexResult<SearchHits> {
        let match_expr = build_match_expression(request);

        let mut bind_values: Vec<Value> = vec![Value::Text(request.kind.as_str().to_string())];
        let (from_sql, rank_sql, order_sql) = if let Some(expr) = match_expr.as_ref() {
            bind_values.push(Value::Text(expr.clone()));
            (
                "index_documents_fts
                 JOIN index_documents d ON d.id = index_documents_fts.rowid
                 WHERE d.kind = ? AND index_documents_fts MATCH ?",
                "bm25(index_documents_fts)",
                "bm25(index_documents_fts) ASC, d.entity_id ASC",
            )
        } else {
            ("index_documents d WHERE d.kind = ?", "0.0", "d.entity_id ASC")
        };

        let mut filter_sql = String::new();
        for (field, value) in &request.filters {
            filter_sql.push_str(" AND json_extract(d.document, ?) = ?");
            bind_values.push(Value::Text(format!("$.{field}")));
            bind_values.push(match value {
                FieldValue::Integer(integer) => Value::Integer(*integer),
                FieldValue::Real(real) => Value::Real(*real),
                FieldValue::Text(text) => Value::Text(text.clone()),
            });
        }

        let query_text = match_expr.clone().unwrap_or_default();
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|err| map_query_error(err, &query_text))?;

        let total = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM {from_sql}{filter_sql};"),
                params_from_iter(bind_values.iter()),
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| map_query_error(err, &query_text))?;

        let mut page_values = bind_values;
        page_values.push(Value::Integer(i64::try_from(request.limit).unwrap_or(i64::MAX)));
        page_values.push(Value::Integer(
            i64::try_from(request.offset).unwrap_or(i64::MAX),
        ));

        let mut hits = Vec::new();
        {
            let mut stmt = tx.prepare(&format!(
                "SELECT d.entity_id AS entity_id, d.document AS document, {rank_sql} AS rank
                 FROM {from_sql}{filter_sql}
                 ORDER BY {order_sql}
                 LIMIT ? OFFSET ?;"
            ))?;
            let mut rows = stmt
                .query(params_from_iter(page_values))
                .map_err(|err| map_query_error(err, &query_text))?;
            while let Some(row) = rows
                .next()
                .map_err(|err| map_query_error(err, &query_text))?
            {
                hits.push(parse_search_hit(request.kind, row)?);
            }
        }
        tx.commit()?;

        Ok(SearchHits {
            hits,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }
}

fn parse_search_hit(kind: EntityKind, row: &Row<'_>) -> IndexResult<SearchHit> {
    let entity_id: EntityId = row.get("entity_id")?;
    let document_text: String = row.get("document")?;
    let projection = Projection {
        kind,
        entity_id,
        document: parse_document(&document_text)?,
        content: String::new(),
    };
    let entity = projection
        .to_entity()
        .map_err(|err| IndexError::InvalidData(format!("{kind} {entity_id}: {err}")))?;

    Ok(SearchHit {
        entity,
        rank: row.get("rank")?,
    })
}

fn parse_document(text: &str) -> IndexResult<serde_json::Value> {
    serde_json::from_str(text).map_err(|err| IndexError::InvalidData(err.to_string()))
}

/// Builds the FTS5 expression, or `None` when the query matches everything.
///
/// Plain mode keeps only letter/digit runs, quotes each and makes it a
/// prefix term, so user input can never produce an FTS5 syntax error.
fn build_match_expression(request: &SearchRequest) -> Option<String> {
    let text = request.text.trim();
    if text.is_empty() {
        return None;
    }

    if request.raw_fts_syntax {
        return Some(text.to_string());
    }

    let terms = TERM_RE
        .find_iter(text)
        .map(|term| format!("\"{}\"*", term.as_str()))
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn map_query_error(err: rusqlite::Error, query: &str) -> IndexError {
    if is_match_syntax_error(&err) {
        return IndexError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    IndexError::Unavailable(err.to_string())
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
                || msg.contains("no such column")
        }
        _ => false,
    }
}
