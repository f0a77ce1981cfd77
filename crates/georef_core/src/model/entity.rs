//! Generic entity record.
//!
//! # Responsibility
//! - Hold one row of any kind as an id plus a typed field map.
//! - Validate the field map against the kind's descriptor.
//! - Decode/encode the JSON shape used by callers and index documents.
//!
//! # Invariants
//! - `id` is `None` until the store assigns it.
//! - After `validated()`, every field is declared, correctly typed, and every
//!   required field is present.

use crate::model::validation::ValidationError;
use crate::schema::{EntityKind, FieldDef, FieldType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Store-assigned identifier, unique per kind and never reused.
pub type EntityId = i64;

/// Scalar value of one entity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        match self {
            Self::Integer(value) => Value::from(*value),
            Self::Real(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Text(value) => Value::String(value.clone()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

/// One row of any kind described by `crate::schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Option<EntityId>,
    pub kind: EntityKind,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    /// Creates an unsaved entity with no fields.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            id: None,
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Parent kind and id, when the kind has a parent edge and it is set.
    pub fn parent_ref(&self) -> Option<(EntityKind, EntityId)> {
        let link = self.kind.schema().parent()?;
        let parent_id = self.get(link.field)?.as_integer()?;
        Some((link.kind, parent_id))
    }

    /// Checks the field map against the descriptor and coerces numeric values.
    ///
    /// Integer input is accepted for real-typed fields.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        let kind = self.kind;
        let schema = kind.schema();
        for (name, value) in self.fields.iter_mut() {
            let def = schema
                .field(name)
                .ok_or_else(|| ValidationError::UnknownField {
                    kind,
                    field: name.clone(),
                })?;
            *value = coerce_value(def, value)?;
        }

        if let Some(missing) = schema
            .fields
            .iter()
            .find(|def| def.required && !self.fields.contains_key(def.name))
        {
            return Err(ValidationError::MissingRequiredField {
                kind,
                field: missing.name,
            });
        }

        Ok(self)
    }

    /// Decodes a JSON object; `null` members are treated as absent.
    pub fn from_json(kind: EntityKind, value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::MalformedPayload("expected a JSON object".into()))?;

        let mut entity = Self::new(kind);
        for (name, member) in object {
            if name == "id" {
                entity.id = decode_id(member)?;
                continue;
            }
            if let Some(decoded) = decode_field(kind, name, member)? {
                entity.fields.insert(name.clone(), decoded);
            }
        }
        Ok(entity)
    }

    /// Encodes as a flat JSON object with an `id` member.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), self.id.map_or(Value::Null, Value::from));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        Value::Object(object)
    }
}

pub(crate) fn decode_id(member: &Value) -> Result<Option<EntityId>, ValidationError> {
    match member {
        Value::Null => Ok(None),
        other => other.as_i64().map(Some).ok_or_else(|| {
            ValidationError::MalformedPayload(format!("`id` must be an integer, got {other}"))
        }),
    }
}

pub(crate) fn decode_field(
    kind: EntityKind,
    name: &str,
    member: &Value,
) -> Result<Option<FieldValue>, ValidationError> {
    let def = kind
        .schema()
        .field(name)
        .ok_or_else(|| ValidationError::UnknownField {
            kind,
            field: name.to_string(),
        })?;

    let raw = match member {
        Value::Null => return Ok(None),
        Value::String(text) => FieldValue::Text(text.clone()),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => FieldValue::Integer(integer),
            None => FieldValue::Real(number.as_f64().ok_or_else(|| type_mismatch(def))?),
        },
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => return Err(type_mismatch(def)),
    };

    coerce_value(def, &raw).map(Some)
}

/// Checks `value` against the declared type of `def`, widening integers to
/// reals. Non-finite reals are rejected: they have no JSON form.
pub(crate) fn coerce_value(
    def: &FieldDef,
    value: &FieldValue,
) -> Result<FieldValue, ValidationError> {
    match (def.field_type, value) {
        (FieldType::Text, FieldValue::Text(_))
        | (FieldType::Integer | FieldType::Reference(_), FieldValue::Integer(_)) => {
            Ok(value.clone())
        }
        (FieldType::Real, FieldValue::Real(real)) if real.is_finite() => Ok(value.clone()),
        (FieldType::Real, FieldValue::Integer(integer)) => Ok(FieldValue::Real(*integer as f64)),
        _ => Err(type_mismatch(def)),
    }
}

fn type_mismatch(def: &FieldDef) -> ValidationError {
    ValidationError::FieldTypeMismatch {
        field: def.name.to_string(),
        expected: def.field_type.describe(),
    }
}
