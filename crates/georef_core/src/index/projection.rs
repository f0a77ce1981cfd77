//! Entity -> index document mapping.
//!
//! # Invariants
//! - A projection carries the entity id, its own fields and its parent id;
//!   parent rows and child collections are never embedded.
//! - `content` is the whitespace-normalized concatenation of searchable text.

use crate::model::entity::{Entity, EntityId};
use crate::model::validation::ValidationError;
use crate::schema::{searchable_fields, EntityKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Denormalized document written into the search index.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub kind: EntityKind,
    pub entity_id: EntityId,
    /// Flat JSON object keyed by `schema::projection_fields`.
    pub document: Value,
    /// Full-text body.
    pub content: String,
}

impl Projection {
    /// Rebuilds the entity carried by this document.
    pub fn to_entity(&self) -> Result<Entity, ValidationError> {
        let entity = Entity::from_json(self.kind, &self.document)?.validated()?;
        if entity.id != Some(self.entity_id) {
            return Err(ValidationError::MalformedPayload(format!(
                "document id {:?} does not match projection id {}",
                entity.id, self.entity_id
            )));
        }
        Ok(entity)
    }
}

/// Projects a persisted entity. Unsaved entities have no projection.
pub fn project(entity: &Entity) -> Result<Projection, ValidationError> {
    let entity_id = entity.id.ok_or(ValidationError::IdMissing)?;

    let body = searchable_fields(entity.kind)
        .into_iter()
        .filter_map(|field| entity.text(field))
        .collect::<Vec<_>>()
        .join(" ");
    let content = WHITESPACE_RE.replace_all(&body, " ").trim().to_string();

    Ok(Projection {
        kind: entity.kind,
        entity_id,
        document: entity.to_json(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::project;
    use crate::model::entity::Entity;
    use crate::model::validation::ValidationError;
    use crate::schema::EntityKind;
    use serde_json::json;

    #[test]
    fn projection_joins_searchable_text_only() {
        let mut macon = Entity::new(EntityKind::Macon)
            .with_field("libelle", "  Atelier\nSawadogo ")
            .with_field("responsable", "Issa")
            .with_field("contacts", "70 00 00 00");
        macon.id = Some(3);

        let projection = project(&macon).expect("persisted entity projects");
        assert_eq!(projection.content, "Atelier Sawadogo Issa 70 00 00 00");
        assert_eq!(projection.document["id"], json!(3));
        assert_eq!(projection.to_entity().expect("round trip"), macon);
    }

    #[test]
    fn child_projection_carries_parent_id_only() {
        let mut commune = Entity::new(EntityKind::Commune)
            .with_field("libelle", "Ouaga")
            .with_field("province", 1_i64);
        commune.id = Some(2);

        let projection = project(&commune).expect("persisted entity projects");
        assert_eq!(
            projection.document,
            json!({"id": 2, "libelle": "Ouaga", "province": 1})
        );
        assert_eq!(projection.content, "Ouaga");
    }

    #[test]
    fn unsaved_entity_has_no_projection() {
        let region = Entity::new(EntityKind::Region).with_field("libelle", "Centre");
        assert_eq!(project(&region), Err(ValidationError::IdMissing));
    }
}
