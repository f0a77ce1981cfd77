use georef_core::db::open_store_db_in_memory;
use georef_core::store::entity_store::PageWindow;
use georef_core::{
    Entity, EntityKind, EntityStore, FieldValue, SortOrder, SqliteEntityStore, StoreError,
};

fn region(libelle: &str) -> Entity {
    Entity::new(EntityKind::Region).with_field("libelle", libelle)
}

fn province(libelle: &str, region_id: i64) -> Entity {
    Entity::new(EntityKind::Province)
        .with_field("libelle", libelle)
        .with_field("region", region_id)
}

#[test]
fn insert_assigns_increasing_ids_and_get_reads_back() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let first = store.insert(&region("Centre")).unwrap();
    let second = store.insert(&region("Nord")).unwrap();
    assert!(second > first);

    let loaded = store.get(EntityKind::Region, first).unwrap().unwrap();
    assert_eq!(loaded.id, Some(first));
    assert_eq!(loaded.text("libelle"), Some("Centre"));
    assert!(store.exists(EntityKind::Region, second).unwrap());
    assert!(store.get(EntityKind::Province, first).unwrap().is_none());
}

#[test]
fn ids_are_not_reused_after_delete() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let first = store.insert(&region("Centre")).unwrap();
    assert!(store.delete(EntityKind::Region, first).unwrap());
    assert!(!store.delete(EntityKind::Region, first).unwrap());

    let next = store.insert(&region("Nord")).unwrap();
    assert!(next > first);
}

#[test]
fn replace_overwrites_all_columns_and_reports_missing_rows() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let id = store
        .insert(
            &Entity::new(EntityKind::Section)
                .with_field("libelle", "S1")
                .with_field("numero", 4_i64),
        )
        .unwrap();

    let replacement = Entity::new(EntityKind::Section).with_field("libelle", "S1-bis");
    assert!(store.replace(id, &replacement).unwrap());

    let loaded = store.get(EntityKind::Section, id).unwrap().unwrap();
    assert_eq!(loaded.text("libelle"), Some("S1-bis"));
    assert!(loaded.get("numero").is_none());

    assert!(!store.replace(id + 100, &replacement).unwrap());
}

#[test]
fn real_fields_round_trip_as_real() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let id = store
        .insert(
            &Entity::new(EntityKind::Parcelle)
                .with_field("libelle", "P-1")
                .with_field("superficie", 412.5),
        )
        .unwrap();

    let loaded = store.get(EntityKind::Parcelle, id).unwrap().unwrap();
    assert_eq!(loaded.get("superficie"), Some(&FieldValue::Real(412.5)));
}

#[test]
fn page_orders_by_requested_field_and_breaks_ties_by_id() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let b = store.insert(&region("Bam")).unwrap();
    let a1 = store.insert(&region("Ako")).unwrap();
    let a2 = store.insert(&region("Ako")).unwrap();

    let page = store
        .page(
            EntityKind::Region,
            &PageWindow {
                offset: 0,
                limit: 10,
                sort: SortOrder::asc("libelle"),
                parent: None,
            },
        )
        .unwrap();
    let ids = page.items.iter().map(|e| e.id.unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec![a1, a2, b]);
    assert_eq!(page.total, 3);

    let page = store
        .page(
            EntityKind::Region,
            &PageWindow {
                offset: 1,
                limit: 1,
                sort: SortOrder::desc("id"),
                parent: None,
            },
        )
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, Some(a1));
    assert_eq!(page.total, 3);
}

#[test]
fn page_filters_by_parent_column() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let centre = store.insert(&region("Centre")).unwrap();
    let nord = store.insert(&region("Nord")).unwrap();
    store.insert(&province("Kadiogo", centre)).unwrap();
    store.insert(&province("Yatenga", nord)).unwrap();
    store.insert(&province("Oubritenga", centre)).unwrap();

    let page = store
        .page(
            EntityKind::Province,
            &PageWindow {
                limit: 10,
                parent: Some(centre),
                ..PageWindow::default()
            },
        )
        .unwrap();
    let names = page
        .items
        .iter()
        .map(|e| e.text("libelle").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Kadiogo", "Oubritenga"]);
    assert_eq!(page.total, 2);
}

#[test]
fn page_rejects_unknown_sort_column_and_parentless_filter() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let err = store
        .page(
            EntityKind::Region,
            &PageWindow {
                limit: 10,
                sort: SortOrder::asc("libelle; DROP TABLE region"),
                ..PageWindow::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedQuery(_)));

    let err = store
        .page(
            EntityKind::Macon,
            &PageWindow {
                limit: 10,
                parent: Some(1),
                ..PageWindow::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedQuery(_)));
}

#[test]
fn corrupted_rows_surface_as_invalid_data() {
    let conn = open_store_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    conn.execute(
        "INSERT INTO commune (libelle, province) VALUES ('Ouaga', 'three');",
        [],
    )
    .unwrap();
    let id = conn.last_insert_rowid();

    let err = store.get(EntityKind::Commune, id).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}
