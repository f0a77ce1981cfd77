//! Merge-patch input for partial updates.
//!
//! # Invariants
//! - A field present in the patch overwrites the stored value.
//! - A field absent from the patch (or `null` in JSON) leaves the stored value
//!   untouched; a patch cannot clear a field.

use crate::model::entity::{decode_field, decode_id, Entity, EntityId, FieldValue};
use crate::model::validation::ValidationError;
use crate::schema::EntityKind;
use serde_json::Value;
use std::collections::BTreeMap;

/// Sparse set of field overwrites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    /// Optional echo of the target id; must match when present.
    pub id: Option<EntityId>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decodes a JSON merge patch; `null` members mean "no change".
    pub fn from_json(kind: EntityKind, value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::MalformedPayload("expected a JSON object".into()))?;

        let mut patch = Self::new();
        for (name, member) in object {
            if name == "id" {
                patch.id = decode_id(member)?;
                continue;
            }
            if let Some(decoded) = decode_field(kind, name, member)? {
                patch.fields.insert(name.clone(), decoded);
            }
        }
        Ok(patch)
    }

    /// Whether applying the patch changes the parent reference of `kind`.
    pub fn touches_parent(&self, kind: EntityKind) -> bool {
        kind.schema()
            .parent()
            .is_some_and(|link| self.fields.contains_key(link.field))
    }

    /// Returns `base` with every patched field overwritten.
    pub fn apply_to(&self, base: &Entity) -> Entity {
        let mut merged = base.clone();
        for (name, value) in &self.fields {
            merged.fields.insert(name.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::EntityPatch;
    use crate::model::entity::{Entity, FieldValue};
    use crate::schema::EntityKind;
    use serde_json::json;

    fn stored_commune() -> Entity {
        let mut commune = Entity::new(EntityKind::Commune)
            .with_field("libelle", "Ouaga")
            .with_field("province", 1_i64);
        commune.id = Some(10);
        commune
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let merged = EntityPatch::new()
            .with_field("libelle", "Ouagadougou")
            .apply_to(&stored_commune());
        assert_eq!(merged.text("libelle"), Some("Ouagadougou"));
        assert_eq!(merged.get("province"), Some(&FieldValue::Integer(1)));
        assert_eq!(merged.id, Some(10));
    }

    #[test]
    fn empty_patch_is_identity() {
        let base = stored_commune();
        assert_eq!(EntityPatch::new().apply_to(&base), base);
    }

    #[test]
    fn json_null_means_no_change() {
        let patch = EntityPatch::from_json(
            EntityKind::Commune,
            &json!({"libelle": null, "province": 2}),
        )
        .expect("valid patch");
        assert!(!patch.fields.contains_key("libelle"));
        assert!(patch.touches_parent(EntityKind::Commune));

        let merged = patch.apply_to(&stored_commune());
        assert_eq!(merged.text("libelle"), Some("Ouaga"));
        assert_eq!(merged.get("province"), Some(&FieldValue::Integer(2)));
    }
}
