use georef_core::db::open_index_db_in_memory;
use georef_core::index::fts::SearchRequest;
use georef_core::index::projection::project;
use georef_core::{Entity, EntityKind, IndexError, SearchIndex, SqliteSearchIndex};

fn persisted(kind: EntityKind, id: i64, fields: &[(&str, &str)]) -> Entity {
    let mut entity = Entity::new(kind);
    for (name, value) in fields {
        entity.set(name, *value);
    }
    entity.id = Some(id);
    entity
}

fn commune(id: i64, libelle: &str, province: i64) -> Entity {
    let mut entity = Entity::new(EntityKind::Commune)
        .with_field("libelle", libelle)
        .with_field("province", province);
    entity.id = Some(id);
    entity
}

fn ids(index: &SqliteSearchIndex<'_>, request: &SearchRequest) -> Vec<i64> {
    index
        .query(request)
        .unwrap()
        .hits
        .into_iter()
        .map(|hit| hit.entity.id.unwrap())
        .collect()
}

#[test]
fn put_is_an_upsert_and_get_returns_latest_projection() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    index.put(&project(&commune(1, "Ouaga", 3)).unwrap()).unwrap();
    index.put(&project(&commune(1, "Ouagadougou", 3)).unwrap()).unwrap();

    let stored = index.get(EntityKind::Commune, 1).unwrap().unwrap();
    assert_eq!(stored.content, "Ouagadougou");
    assert_eq!(stored.to_entity().unwrap(), commune(1, "Ouagadougou", 3));

    let old = SearchRequest::new(EntityKind::Commune, "ouaga");
    assert_eq!(ids(&index, &old), vec![1]);
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM index_documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn delete_removes_document_and_is_idempotent() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    index.put(&project(&commune(1, "Bobo", 2)).unwrap()).unwrap();
    index.delete(EntityKind::Commune, 1).unwrap();
    index.delete(EntityKind::Commune, 1).unwrap();

    assert!(index.get(EntityKind::Commune, 1).unwrap().is_none());
    assert!(ids(&index, &SearchRequest::new(EntityKind::Commune, "bobo")).is_empty());
}

#[test]
fn query_is_scoped_to_kind_and_matches_prefixes_without_accents() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    index
        .put(&project(&persisted(EntityKind::Region, 1, &[("libelle", "Hauts-Bassins")])).unwrap())
        .unwrap();
    index
        .put(&project(&persisted(EntityKind::Province, 1, &[("libelle", "Houet Bassins")])).unwrap())
        .unwrap();
    index
        .put(&project(&persisted(EntityKind::Region, 2, &[("libelle", "Plateau-Central")])).unwrap())
        .unwrap();
    index
        .put(&project(&persisted(EntityKind::Region, 3, &[("libelle", "Sahel Éloigné")])).unwrap())
        .unwrap();

    assert_eq!(ids(&index, &SearchRequest::new(EntityKind::Region, "bass")), vec![1]);
    assert_eq!(ids(&index, &SearchRequest::new(EntityKind::Province, "bass")), vec![1]);
    assert_eq!(ids(&index, &SearchRequest::new(EntityKind::Region, "eloigne")), vec![3]);
    assert_eq!(
        ids(&index, &SearchRequest::new(EntityKind::Region, "plateau central")),
        vec![2]
    );
    assert!(ids(&index, &SearchRequest::new(EntityKind::Region, "plateau nord")).is_empty());
}

#[test]
fn blank_query_lists_kind_by_id_with_total() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    for id in [3, 1, 2] {
        index.put(&project(&commune(id, "Commune", 1)).unwrap()).unwrap();
    }

    let mut request = SearchRequest::new(EntityKind::Commune, "   ");
    request.limit = 2;
    let result = index.query(&request).unwrap();
    assert_eq!(result.total, 3);
    let listed = result
        .hits
        .iter()
        .map(|hit| (hit.entity.id.unwrap(), hit.rank))
        .collect::<Vec<_>>();
    assert_eq!(listed, vec![(1, 0.0), (2, 0.0)]);

    request.offset = 2;
    assert_eq!(ids(&index, &request), vec![3]);
}

#[test]
fn filters_restrict_matches_on_projected_fields() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    index.put(&project(&commune(1, "Saaba", 3)).unwrap()).unwrap();
    index.put(&project(&commune(2, "Komki", 3)).unwrap()).unwrap();
    index.put(&project(&commune(3, "Saponé", 4)).unwrap()).unwrap();

    let mut request = SearchRequest::new(EntityKind::Commune, "");
    request.filters.insert("province".to_string(), 3_i64.into());
    let result = index.query(&request).unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(ids(&index, &request), vec![1, 2]);

    request.text = "sa".to_string();
    assert_eq!(ids(&index, &request), vec![1]);
}

#[test]
fn ranked_results_prefer_better_matches() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    index
        .put(
            &project(&persisted(
                EntityKind::Macon,
                1,
                &[
                    ("libelle", "Atelier Kaboré"),
                    ("responsable", "Awa Ouedraogo"),
                    ("contacts", "Zone industrielle de Kossodo, route de Kaya, face station"),
                ],
            ))
            .unwrap(),
        )
        .unwrap();
    index
        .put(&project(&persisted(EntityKind::Macon, 2, &[("libelle", "Kaboré Kaboré")])).unwrap())
        .unwrap();

    let result = index
        .query(&SearchRequest::new(EntityKind::Macon, "kabore"))
        .unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(result.hits[0].entity.id, Some(2));
    assert!(result.hits[0].rank <= result.hits[1].rank);
}

#[test]
fn malformed_raw_query_is_invalid_query() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();
    index.put(&project(&commune(1, "Ouaga", 1)).unwrap()).unwrap();

    let mut request = SearchRequest::new(EntityKind::Commune, "\"unterminated");
    request.raw_fts_syntax = true;
    let err = index.query(&request).unwrap_err();
    assert!(matches!(err, IndexError::InvalidQuery { .. }));

    let mut request = SearchRequest::new(EntityKind::Commune, "ouag*");
    request.raw_fts_syntax = true;
    assert_eq!(ids(&index, &request), vec![1]);
}

#[test]
fn plain_query_with_fts_operators_never_fails() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();
    index.put(&project(&commune(1, "Ouaga", 1)).unwrap()).unwrap();

    let request = SearchRequest::new(EntityKind::Commune, "ouaga AND (\" OR NEAR");
    assert!(index.query(&request).is_ok());
}

#[test]
fn clear_removes_only_one_kind() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();

    index.put(&project(&commune(1, "Ouaga", 1)).unwrap()).unwrap();
    index.put(&project(&commune(2, "Bobo", 1)).unwrap()).unwrap();
    index
        .put(&project(&persisted(EntityKind::Region, 1, &[("libelle", "Centre")])).unwrap())
        .unwrap();

    assert_eq!(index.clear(EntityKind::Commune).unwrap(), 2);
    assert!(ids(&index, &SearchRequest::new(EntityKind::Commune, "")).is_empty());
    assert_eq!(ids(&index, &SearchRequest::new(EntityKind::Region, "centre")), vec![1]);
}

#[test]
fn missing_backend_table_is_unavailable() {
    let conn = open_index_db_in_memory().unwrap();
    let index = SqliteSearchIndex::try_new(&conn).unwrap();
    conn.execute_batch("DROP TABLE index_documents;").unwrap();

    let err = index
        .query(&SearchRequest::new(EntityKind::Commune, "ouaga"))
        .unwrap_err();
    assert!(matches!(err, IndexError::Unavailable(_)));

    let err = index.put(&project(&commune(1, "Ouaga", 1)).unwrap()).unwrap_err();
    assert!(matches!(err, IndexError::Unavailable(_)));
}
