//! Read-side facade: store listings and index search.
//!
//! # Responsibility
//! - Validate pagination input against configured limits.
//! - Serve exact-match reads and ordered listings from the entity store.
//! - Serve ranked free-text search from the search index.
//!
//! # Invariants
//! - Listings default to `id ASC`.
//! - An unreachable index is reported as `IndexUnavailable`, never as an
//!   empty page.

use crate::index::fts::{SearchHit, SearchIndex, SearchRequest};
use crate::model::entity::{coerce_value, Entity, EntityId, FieldValue};
use crate::model::page::{Page, PageRequest};
use crate::model::validation::ValidationError;
use crate::schema::EntityKind;
use crate::service::error::{ServiceError, ServiceResult};
use crate::store::entity_store::{EntityStore, PageWindow};
use log::{debug, error};
use std::collections::BTreeMap;

/// Page size bounds applied to every listing and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Free-text search input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Blank text matches every document of the kind.
    pub text: String,
    /// Equality filters on projected fields (faceting).
    pub filters: BTreeMap<String, FieldValue>,
    /// Whether to pass text directly as raw FTS5 expression.
    pub raw_fts_syntax: bool,
    pub page: i64,
    pub page_size: Option<i64>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }

    pub fn paged(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }
}

/// Query facade over one store and one index.
pub struct QueryService<S: EntityStore, I: SearchIndex> {
    store: S,
    index: I,
    limits: PageLimits,
}

impl<S: EntityStore, I: SearchIndex> QueryService<S, I> {
    pub fn new(store: S, index: I, limits: PageLimits) -> Self {
        Self {
            store,
            index,
            limits,
        }
    }

    /// Gets one entity by id from the store.
    pub fn get(&self, kind: EntityKind, id: EntityId) -> ServiceResult<Option<Entity>> {
        Ok(self.store.get(kind, id)?)
    }

    /// Lists one page of `kind` from the store.
    ///
    /// # Errors
    /// - `BadPagination` for negative coordinates, oversized pages or an
    ///   unknown sort column.
    pub fn list(&self, kind: EntityKind, request: &PageRequest) -> ServiceResult<Page<Entity>> {
        self.list_window(kind, request, None)
    }

    /// Lists one page of the children of `parent_id`.
    ///
    /// # Errors
    /// - `NoParentRelation` when `kind` has no parent edge.
    /// - `BadPagination` as for [`QueryService::list`].
    pub fn list_by_parent(
        &self,
        kind: EntityKind,
        parent_id: EntityId,
        request: &PageRequest,
    ) -> ServiceResult<Page<Entity>> {
        if kind.schema().parent().is_none() {
            return Err(ValidationError::NoParentRelation(kind).into());
        }
        self.list_window(kind, request, Some(parent_id))
    }

    /// Runs a ranked free-text search over `kind` projections.
    ///
    /// # Errors
    /// - `BadPagination` for invalid page coordinates.
    /// - `UnknownField` when a filter names a field outside the projection.
    /// - `FieldTypeMismatch` when a filter value does not fit its field.
    /// - `BadQuery` when a raw FTS5 expression is malformed.
    /// - `IndexUnavailable` when the index backend cannot be reached.
    pub fn search(&self, kind: EntityKind, query: &SearchQuery) -> ServiceResult<Page<SearchHit>> {
        let (page, page_size, offset) = self.resolve_page(query.page, query.page_size)?;

        let filters = typed_filters(kind, &query.filters)?;

        let request = SearchRequest {
            kind,
            text: query.text.clone(),
            filters,
            raw_fts_syntax: query.raw_fts_syntax,
            offset,
            limit: page_size,
        };
        let result = self.index.query(&request).map_err(|err| {
            error!("event=entity_search module=query status=error kind={kind} error={err}");
            ServiceError::from(err)
        })?;

        debug!(
            "event=entity_search module=query status=ok kind={kind} hits={} total={}",
            result.hits.len(),
            result.total
        );
        Ok(Page {
            items: result.hits,
            total: result.total,
            page,
            page_size,
        })
    }

    fn list_window(
        &self,
        kind: EntityKind,
        request: &PageRequest,
        parent: Option<EntityId>,
    ) -> ServiceResult<Page<Entity>> {
        let (page, page_size, offset) = self.resolve_page(request.page, request.page_size)?;
        let sort = request.sort.clone().unwrap_or_default();
        if !kind.schema().is_sortable(&sort.field) {
            return Err(ValidationError::BadPagination(format!(
                "`{kind}` cannot be sorted by `{}`",
                sort.field
            ))
            .into());
        }

        let window = PageWindow {
            offset,
            limit: page_size,
            sort,
            parent,
        };
        let result = self.store.page(kind, &window)?;

        debug!(
            "event=entity_list module=query status=ok kind={kind} page={page} items={} total={}",
            result.items.len(),
            result.total
        );
        Ok(Page {
            items: result.items,
            total: result.total,
            page,
            page_size,
        })
    }

    /// Returns `(page, page_size, offset)` or `BadPagination`.
    fn resolve_page(&self, page: i64, page_size: Option<i64>) -> ServiceResult<(u64, u64, u64)> {
        let page = u64::try_from(page).map_err(|_| {
            ValidationError::BadPagination(format!("page must be non-negative, got {page}"))
        })?;

        let page_size = match page_size {
            None => self.limits.default_page_size,
            Some(size) => u64::try_from(size).map_err(|_| {
                ValidationError::BadPagination(format!(
                    "page size must be non-negative, got {size}"
                ))
            })?,
        };
        if page_size > self.limits.max_page_size {
            return Err(ValidationError::BadPagination(format!(
                "page size {page_size} exceeds maximum {}",
                self.limits.max_page_size
            ))
            .into());
        }

        let offset = page.checked_mul(page_size).ok_or_else(|| {
            ValidationError::BadPagination(format!("page {page} is out of range"))
        })?;
        Ok((page, page_size, offset))
    }
}

/// Checks each filter against the projected field it names and returns the
/// values in the representation stored in index documents.
fn typed_filters(
    kind: EntityKind,
    filters: &BTreeMap<String, FieldValue>,
) -> Result<BTreeMap<String, FieldValue>, ValidationError> {
    let schema = kind.schema();
    let mut typed = BTreeMap::new();
    for (name, value) in filters {
        let value = if name == "id" {
            match value {
                FieldValue::Integer(_) => value.clone(),
                _ => {
                    return Err(ValidationError::FieldTypeMismatch {
                        field: name.clone(),
                        expected: "integer",
                    })
                }
            }
        } else {
            let def = schema
                .field(name)
                .ok_or_else(|| ValidationError::UnknownField {
                    kind,
                    field: name.clone(),
                })?;
            coerce_value(def, value)?
        };
        typed.insert(name.clone(), value);
    }
    Ok(typed)
}
