//! End-to-end tests of the datastore contract against an on-disk store.

use queryvault_core::{open, Config, Datastore, StoreError};
use std::collections::HashSet;
use std::time::Duration;
use tempfile::TempDir;

fn config_for(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = Some(dir.path().join("queryvault.db"));
    config.database.mappings_read_timeout = Duration::from_secs(5);
    config.database.query_read_timeout = Duration::from_secs(5);
    config
}

fn open_store(dir: &TempDir) -> impl Datastore {
    open(&config_for(dir))
        .expect("open failed")
        .expect("store should be present")
}

#[tokio::test]
async fn append_then_read() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    db.create_query_revision("heroes", "by-name", "from hero with name = ?name")
        .await
        .unwrap();

    let rev = db.find_query("heroes", "by-name", 1).await.unwrap();
    assert_eq!(rev.text, "from hero with name = ?name");
    assert!(!rev.archived);

    db.create_query_revision("heroes", "by-name", "from hero with id = ?id")
        .await
        .unwrap();

    let first = db.find_query("heroes", "by-name", 1).await.unwrap();
    let second = db.find_query("heroes", "by-name", 2).await.unwrap();
    assert_eq!(first.text, "from hero with name = ?name");
    assert_eq!(second.text, "from hero with id = ?id");
}

#[tokio::test]
async fn out_of_range_revisions_are_invalid() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    db.create_query_revision("heroes", "by-name", "v1").await.unwrap();
    db.create_query_revision("heroes", "by-name", "v2").await.unwrap();

    assert!(matches!(
        db.find_query("heroes", "by-name", 0).await,
        Err(StoreError::InvalidRevision { .. })
    ));
    assert!(matches!(
        db.find_query("heroes", "by-name", 3).await,
        Err(StoreError::InvalidRevision { .. })
    ));
    assert!(db.find_query("heroes", "by-name", 2).await.is_ok());
}

#[tokio::test]
async fn archiving_cascades() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    for text in ["v1", "v2", "v3"] {
        db.create_query_revision("heroes", "by-name", text).await.unwrap();
    }

    db.update_query_archiving("heroes", "by-name", true).await.unwrap();
    for ordinal in 1..=3 {
        assert!(db.find_query("heroes", "by-name", ordinal).await.unwrap().archived);
    }

    db.update_revision_archiving("heroes", "by-name", 2, false)
        .await
        .unwrap();

    let summary = db
        .find_query_with_all_revisions("heroes", "by-name", true)
        .await
        .unwrap();
    assert!(!summary.archived);
    let archived_ordinals: Vec<u64> = summary.revisions.iter().map(|r| r.ordinal).collect();
    assert_eq!(archived_ordinals, vec![1, 3]);
    assert!(!db.find_query("heroes", "by-name", 2).await.unwrap().archived);
}

#[tokio::test]
async fn listing_filters_by_archiving_state() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    for text in ["v1", "v2", "v3"] {
        db.create_query_revision("heroes", "by-name", text).await.unwrap();
    }
    db.update_revision_archiving("heroes", "by-name", 2, true)
        .await
        .unwrap();

    let archived = db.find_queries_for_namespace("heroes", true).await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].revisions.len(), 1);
    assert_eq!(archived[0].revisions[0].ordinal, 2);

    let active = db.find_queries_for_namespace("heroes", false).await.unwrap();
    assert_eq!(active.len(), 1);
    let ordinals: Vec<u64> = active[0].revisions.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, vec![1, 3]);

    assert!(matches!(
        db.find_queries_for_namespace("villains", false).await,
        Err(StoreError::NamespaceNotFound { .. })
    ));
}

#[tokio::test]
async fn missing_documents_are_not_found() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    assert!(matches!(
        db.find_query("nsX", "missing", 1).await,
        Err(StoreError::QueryNotFound { .. })
    ));
    assert!(matches!(
        db.update_query_archiving("nsX", "missing", true).await,
        Err(StoreError::QueryNotFound { .. })
    ));
    assert!(matches!(
        db.find_mappings_for_tenant("ghost").await,
        Err(StoreError::MappingsNotFound { .. })
    ));
}

#[tokio::test]
async fn namespace_enumeration() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    assert!(db.find_all_namespaces().await.unwrap().is_empty());

    db.create_query_revision("heroes", "one", "v1").await.unwrap();
    db.create_query_revision("villains", "one", "v1").await.unwrap();
    db.create_query_revision("heroes", "two", "v1").await.unwrap();

    let namespaces: HashSet<String> =
        db.find_all_namespaces().await.unwrap().into_iter().collect();
    assert_eq!(
        namespaces,
        HashSet::from(["heroes".to_string(), "villains".to_string()])
    );
}

#[tokio::test]
async fn mapping_upserts_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = open_store(&dir);

    db.set_mapping("acme", "hero", "http://heroes.api/hero").await.unwrap();
    db.set_mapping("acme", "hero", "http://heroes.api/hero").await.unwrap();
    db.set_mapping("acme", "villain", "http://villains.api/villain")
        .await
        .unwrap();

    // Mapping order is not part of the contract; compare as a set.
    let bindings: HashSet<(String, String)> = db
        .find_mappings_for_tenant("acme")
        .await
        .unwrap()
        .into_iter()
        .map(|m| (m.resource_name().to_string(), m.url().to_string()))
        .collect();
    assert_eq!(
        bindings,
        HashSet::from([
            ("hero".to_string(), "http://heroes.api/hero".to_string()),
            ("villain".to_string(), "http://villains.api/villain".to_string()),
        ])
    );

    db.set_mapping("acme", "hero", "http://heroes.api/v2/hero")
        .await
        .unwrap();
    let bindings: HashSet<(String, String)> = db
        .find_mappings_for_tenant("acme")
        .await
        .unwrap()
        .into_iter()
        .map(|m| (m.resource_name().to_string(), m.url().to_string()))
        .collect();
    assert!(bindings.contains(&("hero".to_string(), "http://heroes.api/v2/hero".to_string())));
    assert!(bindings.contains(&("villain".to_string(), "http://villains.api/villain".to_string())));

    let tenants = db.find_all_tenants().await.unwrap();
    assert_eq!(tenants, vec!["acme".to_string()]);
}

#[tokio::test]
async fn store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let db = open_store(&dir);
        db.create_query_revision("heroes", "by-name", "v1").await.unwrap();
        db.update_query_archiving("heroes", "by-name", true).await.unwrap();
        db.set_mapping("acme", "hero", "http://heroes.api/hero").await.unwrap();
    }

    let db = open_store(&dir);
    let rev = db.find_query("heroes", "by-name", 1).await.unwrap();
    assert_eq!(rev.text, "v1");
    assert!(rev.archived);
    assert_eq!(db.find_mappings_for_tenant("acme").await.unwrap().len(), 1);
}
