//! Entity store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/exists/insert/replace/delete/page over any entity kind.
//! - Build SQL from `schema` descriptors instead of per-kind code.
//!
//! # Invariants
//! - Write paths validate the entity against its descriptor before SQL.
//! - Read paths reject persisted values that do not fit the descriptor.
//! - Table and column names only ever come from static descriptors.

use crate::db::migrations::{current_user_version, STORE_MIGRATIONS};
use crate::db::DbError;
use crate::model::entity::{Entity, EntityId, FieldValue};
use crate::model::page::SortOrder;
use crate::model::validation::ValidationError;
use crate::schema::{EntityKind, EntitySchema, FieldType};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity store error for persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Request cannot be expressed against the kind's table.
    UnsupportedQuery(String),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::UnsupportedQuery(message) => write!(f, "unsupported store query: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::UnsupportedQuery(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Offset/limit window over one kind's table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
    pub sort: SortOrder,
    /// Restricts rows to children of this parent id.
    pub parent: Option<EntityId>,
}

/// Rows of one window plus the total row count matching the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePage {
    pub items: Vec<Entity>,
    pub total: u64,
}

/// Store driver interface.
pub trait EntityStore {
    fn get(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Entity>>;
    fn exists(&self, kind: EntityKind, id: EntityId) -> StoreResult<bool>;
    /// Persists a new row and returns the assigned id; `entity.id` is ignored.
    fn insert(&self, entity: &Entity) -> StoreResult<EntityId>;
    /// Overwrites every column of row `id`. Returns `false` when no row matched.
    fn replace(&self, id: EntityId, entity: &Entity) -> StoreResult<bool>;
    /// Returns `false` when no row matched.
    fn delete(&self, kind: EntityKind, id: EntityId) -> StoreResult<bool>;
    fn page(&self, kind: EntityKind, window: &PageWindow) -> StoreResult<StorePage>;
}

/// SQLite-backed entity store.
pub struct SqliteEntityStore<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Creates a store over a connection opened with `open_store_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn get(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Entity>> {
        let schema = kind.schema();
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE id = ?1;",
            select_sql(schema)
        ))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(schema, row)?));
        }

        Ok(None)
    }

    fn exists(&self, kind: EntityKind, id: EntityId) -> StoreResult<bool> {
        let found = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                kind.schema().table
            ),
            [id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(found)
    }

    fn insert(&self, entity: &Entity) -> StoreResult<EntityId> {
        let entity = entity.clone().validated()?;
        let schema = entity.kind.schema();
        let columns = schema
            .fields
            .iter()
            .map(|field| field.name)
            .collect::<Vec<_>>();
        let placeholders = (1..=columns.len())
            .map(|position| format!("?{position}"))
            .collect::<Vec<_>>();

        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({});",
                schema.table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(bind_values(schema, &entity)),
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn replace(&self, id: EntityId, entity: &Entity) -> StoreResult<bool> {
        let entity = entity.clone().validated()?;
        let schema = entity.kind.schema();
        let assignments = schema
            .fields
            .iter()
            .enumerate()
            .map(|(position, field)| format!("{} = ?{}", field.name, position + 1))
            .collect::<Vec<_>>();
        let mut values = bind_values(schema, &entity);
        values.push(Value::Integer(id));

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET {} WHERE id = ?{};",
                schema.table,
                assignments.join(", "),
                values.len()
            ),
            params_from_iter(values),
        )?;

        Ok(changed > 0)
    }

    fn delete(&self, kind: EntityKind, id: EntityId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", kind.schema().table),
            [id],
        )?;
        Ok(changed > 0)
    }

    fn page(&self, kind: EntityKind, window: &PageWindow) -> StoreResult<StorePage> {
        let schema = kind.schema();
        if !schema.is_sortable(&window.sort.field) {
            return Err(StoreError::UnsupportedQuery(format!(
                "`{kind}` cannot be sorted by `{}`",
                window.sort.field
            )));
        }

        let mut filter = String::new();
        let mut filter_values: Vec<Value> = Vec::new();
        if let Some(parent_id) = window.parent {
            let link = schema.parent().ok_or_else(|| {
                StoreError::UnsupportedQuery(format!("`{kind}` has no parent column"))
            })?;
            filter.push_str(&format!(" WHERE {} = ?", link.field));
            filter_values.push(Value::Integer(parent_id));
        }

        // Deferred read transaction so `total` and `items` see the same snapshot.
        let tx = self.conn.unchecked_transaction()?;
        let total = tx.query_row(
            &format!("SELECT COUNT(*) FROM {}{filter};", schema.table),
            params_from_iter(filter_values.iter()),
            |row| row.get::<_, i64>(0),
        )?;

        let mut sql = format!("{}{filter}", select_sql(schema));
        // Tie-break on id keeps pages stable for non-unique sort columns.
        sql.push_str(&format!(
            " ORDER BY {} {}, id ASC LIMIT ? OFFSET ?;",
            window.sort.field,
            window.sort.direction.as_sql()
        ));
        let mut values = filter_values;
        values.push(Value::Integer(clamp_to_i64(window.limit)));
        values.push(Value::Integer(clamp_to_i64(window.offset)));

        let mut items = Vec::new();
        {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            while let Some(row) = rows.next()? {
                items.push(parse_entity_row(schema, row)?);
            }
        }
        tx.commit()?;

        Ok(StorePage {
            items,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = STORE_MIGRATIONS.latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn select_sql(schema: &EntitySchema) -> String {
    format!(
        "SELECT {} FROM {}",
        schema.column_names().join(", "),
        schema.table
    )
}

fn bind_values(schema: &EntitySchema, entity: &Entity) -> Vec<Value> {
    schema
        .fields
        .iter()
        .map(|field| match entity.get(field.name) {
            Some(FieldValue::Integer(value)) => Value::Integer(*value),
            Some(FieldValue::Real(value)) => Value::Real(*value),
            Some(FieldValue::Text(value)) => Value::Text(value.clone()),
            None => Value::Null,
        })
        .collect()
}

fn parse_entity_row(schema: &EntitySchema, row: &Row<'_>) -> StoreResult<Entity> {
    let mut entity = Entity::new(schema.kind);
    entity.id = Some(row.get("id")?);

    for field in schema.fields {
        let raw: Value = row.get(field.name)?;
        let value = match (field.field_type, raw) {
            (_, Value::Null) => continue,
            (FieldType::Text, Value::Text(text)) => FieldValue::Text(text),
            (FieldType::Integer | FieldType::Reference(_), Value::Integer(integer)) => {
                FieldValue::Integer(integer)
            }
            (FieldType::Real, Value::Real(real)) => FieldValue::Real(real),
            (FieldType::Real, Value::Integer(integer)) => FieldValue::Real(integer as f64),
            (expected, other) => {
                return Err(StoreError::InvalidData(format!(
                    "{}.{} holds {:?}, expected {}",
                    schema.table,
                    field.name,
                    other.data_type(),
                    expected.describe()
                )));
            }
        };
        entity.fields.insert(field.name.to_string(), value);
    }

    if let Err(err) = entity.clone().validated() {
        return Err(StoreError::InvalidData(format!(
            "{} row {:?}: {err}",
            schema.table, entity.id
        )));
    }
    Ok(entity)
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
