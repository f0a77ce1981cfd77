//! Hierarchy graph: static descriptors for every entity type.
//!
//! # Responsibility
//! - Describe each entity kind: backing table, fields, optional parent link.
//! - Answer parent/child and projection-shape questions without touching data.
//!
//! # Invariants
//! - Edges only point child -> parent; no kind carries a back-reference.
//! - Walking `parent_of` from any kind terminates at a root.
//! - Every kind has at least one required scalar field (`libelle`).

use serde::{Deserialize, Serialize};

/// Every entity type managed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Region,
    Province,
    Commune,
    Localite,
    Secteur,
    Section,
    Lot,
    Parcelle,
    CentreRegroupement,
    ModeEvacExcreta,
    TypeHabitation,
    NatureOuvrage,
    Prefabricant,
    Macon,
}

impl EntityKind {
    pub const ALL: [EntityKind; 14] = [
        EntityKind::Region,
        EntityKind::Province,
        EntityKind::Commune,
        EntityKind::Localite,
        EntityKind::Secteur,
        EntityKind::Section,
        EntityKind::Lot,
        EntityKind::Parcelle,
        EntityKind::CentreRegroupement,
        EntityKind::ModeEvacExcreta,
        EntityKind::TypeHabitation,
        EntityKind::NatureOuvrage,
        EntityKind::Prefabricant,
        EntityKind::Macon,
    ];

    /// Stable snake_case name, shared by table names and index documents.
    pub fn as_str(self) -> &'static str {
        self.schema().table
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }

    pub fn schema(self) -> &'static EntitySchema {
        match self {
            Self::Region => &REGION,
            Self::Province => &PROVINCE,
            Self::Commune => &COMMUNE,
            Self::Localite => &LOCALITE,
            Self::Secteur => &SECTEUR,
            Self::Section => &SECTION,
            Self::Lot => &LOT,
            Self::Parcelle => &PARCELLE,
            Self::CentreRegroupement => &CENTRE_REGROUPEMENT,
            Self::ModeEvacExcreta => &MODE_EVAC_EXCRETA,
            Self::TypeHabitation => &TYPE_HABITATION,
            Self::NatureOuvrage => &NATURE_OUVRAGE,
            Self::Prefabricant => &PREFABRICANT,
            Self::Macon => &MACON,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    /// Id of a row of the given kind.
    Reference(EntityKind),
}

impl FieldType {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Reference(_) => "reference id",
        }
    }
}

/// Column-level descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// Text carried into the full-text body of the projection.
    pub searchable: bool,
}

impl FieldDef {
    const fn text(name: &'static str, required: bool) -> Self {
        Self {
            name,
            field_type: FieldType::Text,
            required,
            searchable: true,
        }
    }

    const fn integer(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Integer,
            required: false,
            searchable: false,
        }
    }

    const fn real(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Real,
            required: false,
            searchable: false,
        }
    }

    const fn parent(name: &'static str, kind: EntityKind) -> Self {
        Self {
            name,
            field_type: FieldType::Reference(kind),
            required: false,
            searchable: false,
        }
    }
}

/// Child -> parent edge of the hierarchy graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    /// Field on the child holding the parent id.
    pub field: &'static str,
    pub kind: EntityKind,
}

/// Type descriptor consumed by the generic store, index and services.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.fields.iter().find_map(|field| match field.field_type {
            FieldType::Reference(kind) => Some(ParentLink {
                field: field.name,
                kind,
            }),
            _ => None,
        })
    }

    /// `id` followed by every declared field, in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        std::iter::once("id")
            .chain(self.fields.iter().map(|field| field.name))
            .collect()
    }

    pub fn is_sortable(&self, column: &str) -> bool {
        column == "id" || self.field(column).is_some()
    }
}

const LIBELLE: FieldDef = FieldDef::text("libelle", true);
const RESPONSABLE: FieldDef = FieldDef::text("responsable", false);
const CONTACTS: FieldDef = FieldDef::text("contacts", false);

static REGION: EntitySchema = EntitySchema {
    kind: EntityKind::Region,
    table: "region",
    fields: &[LIBELLE],
};

static PROVINCE: EntitySchema = EntitySchema {
    kind: EntityKind::Province,
    table: "province",
    fields: &[LIBELLE, FieldDef::parent("region", EntityKind::Region)],
};

static COMMUNE: EntitySchema = EntitySchema {
    kind: EntityKind::Commune,
    table: "commune",
    fields: &[LIBELLE, FieldDef::parent("province", EntityKind::Province)],
};

static LOCALITE: EntitySchema = EntitySchema {
    kind: EntityKind::Localite,
    table: "localite",
    fields: &[LIBELLE, FieldDef::parent("commune", EntityKind::Commune)],
};

static SECTEUR: EntitySchema = EntitySchema {
    kind: EntityKind::Secteur,
    table: "secteur",
    fields: &[LIBELLE, FieldDef::parent("localite", EntityKind::Localite)],
};

static SECTION: EntitySchema = EntitySchema {
    kind: EntityKind::Section,
    table: "section",
    fields: &[
        LIBELLE,
        FieldDef::integer("numero"),
        FieldDef::parent("secteur", EntityKind::Secteur),
    ],
};

static LOT: EntitySchema = EntitySchema {
    kind: EntityKind::Lot,
    table: "lot",
    fields: &[LIBELLE, FieldDef::parent("section", EntityKind::Section)],
};

static PARCELLE: EntitySchema = EntitySchema {
    kind: EntityKind::Parcelle,
    table: "parcelle",
    fields: &[
        LIBELLE,
        FieldDef::real("superficie"),
        FieldDef::parent("lot", EntityKind::Lot),
    ],
};

static CENTRE_REGROUPEMENT: EntitySchema = EntitySchema {
    kind: EntityKind::CentreRegroupement,
    table: "centre_regroupement",
    fields: &[LIBELLE, RESPONSABLE, CONTACTS],
};

static MODE_EVAC_EXCRETA: EntitySchema = EntitySchema {
    kind: EntityKind::ModeEvacExcreta,
    table: "mode_evac_excreta",
    fields: &[LIBELLE],
};

static TYPE_HABITATION: EntitySchema = EntitySchema {
    kind: EntityKind::TypeHabitation,
    table: "type_habitation",
    fields: &[LIBELLE],
};

static NATURE_OUVRAGE: EntitySchema = EntitySchema {
    kind: EntityKind::NatureOuvrage,
    table: "nature_ouvrage",
    fields: &[LIBELLE],
};

static PREFABRICANT: EntitySchema = EntitySchema {
    kind: EntityKind::Prefabricant,
    table: "prefabricant",
    fields: &[LIBELLE, RESPONSABLE, CONTACTS],
};

static MACON: EntitySchema = EntitySchema {
    kind: EntityKind::Macon,
    table: "macon",
    fields: &[LIBELLE, RESPONSABLE, CONTACTS],
};

/// Returns the parent edge of `kind`, if any.
pub fn parent_of(kind: EntityKind) -> Option<ParentLink> {
    kind.schema().parent()
}

/// Whether `kind` references `parent` directly.
pub fn has_parent_of_type(kind: EntityKind, parent: EntityKind) -> bool {
    parent_of(kind).is_some_and(|link| link.kind == parent)
}

/// Kinds whose parent edge points at `kind`.
pub fn children_of(kind: EntityKind) -> Vec<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .filter(|candidate| has_parent_of_type(*candidate, kind))
        .collect()
}

/// Parent chain from `kind` (exclusive) up to its root.
///
/// Bounded by the number of kinds, so a malformed table cannot loop.
pub fn ancestry(kind: EntityKind) -> Vec<EntityKind> {
    let mut chain = Vec::new();
    let mut current = kind;
    while let Some(link) = parent_of(current) {
        if chain.len() == EntityKind::ALL.len() {
            break;
        }
        chain.push(link.kind);
        current = link.kind;
    }
    chain
}

/// Keys carried by the index document of `kind`: the id plus own fields.
///
/// Parent links appear as plain ids; parent rows and child collections are
/// never embedded.
pub fn projection_fields(kind: EntityKind) -> Vec<&'static str> {
    kind.schema().column_names()
}

/// Fields whose text feeds the full-text body of the projection.
pub fn searchable_fields(kind: EntityKind) -> Vec<&'static str> {
    kind.schema()
        .fields
        .iter()
        .filter(|field| field.searchable)
        .map(|field| field.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        ancestry, children_of, has_parent_of_type, parent_of, projection_fields,
        searchable_fields, EntityKind, FieldType,
    };

    #[test]
    fn parse_accepts_table_names_and_dashes() {
        assert_eq!(EntityKind::parse("commune"), Some(EntityKind::Commune));
        assert_eq!(
            EntityKind::parse(" Mode-Evac-Excreta "),
            Some(EntityKind::ModeEvacExcreta)
        );
        assert_eq!(EntityKind::parse("district"), None);
    }

    #[test]
    fn every_kind_has_required_libelle() {
        for kind in EntityKind::ALL {
            let field = kind.schema().field("libelle").expect("libelle declared");
            assert!(field.required, "{kind} libelle must be required");
            assert_eq!(field.field_type, FieldType::Text);
            assert_eq!(kind.schema().kind, kind);
        }
    }

    #[test]
    fn parcel_chain_reaches_region() {
        assert_eq!(
            ancestry(EntityKind::Parcelle),
            vec![
                EntityKind::Lot,
                EntityKind::Section,
                EntityKind::Secteur,
                EntityKind::Localite,
                EntityKind::Commune,
                EntityKind::Province,
                EntityKind::Region,
            ]
        );
    }

    #[test]
    fn lookup_kinds_have_no_parent_and_no_children() {
        for kind in [
            EntityKind::ModeEvacExcreta,
            EntityKind::TypeHabitation,
            EntityKind::Prefabricant,
            EntityKind::Macon,
            EntityKind::NatureOuvrage,
            EntityKind::CentreRegroupement,
        ] {
            assert!(parent_of(kind).is_none());
            assert!(children_of(kind).is_empty());
        }
    }

    #[test]
    fn parent_edges_match_hierarchy() {
        assert!(has_parent_of_type(EntityKind::Commune, EntityKind::Province));
        assert!(has_parent_of_type(EntityKind::Lot, EntityKind::Section));
        assert!(!has_parent_of_type(EntityKind::Lot, EntityKind::Secteur));
        assert_eq!(children_of(EntityKind::Region), vec![EntityKind::Province]);
    }

    #[test]
    fn projection_shape_is_id_plus_declared_fields() {
        assert_eq!(
            projection_fields(EntityKind::Parcelle),
            vec!["id", "libelle", "superficie", "lot"]
        );
        assert_eq!(searchable_fields(EntityKind::Parcelle), vec!["libelle"]);
    }
}
