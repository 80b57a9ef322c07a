//! Async database facade and the contract exposed to the host
//!
//! [`open`] is the explicit factory invoked by the host's composition root;
//! there is no import-time registration and no global toggle. A disabled or
//! unconfigured database yields `Ok(None)` so the host can fall back to its
//! non-persistent mode.
//!
//! Blocking SQL work runs on the runtime's blocking pool. When the
//! configured per-operation timeout is non-zero it bounds the whole call,
//! while the derived execution ceiling independently bounds the engine; the
//! tighter one governs.

use super::errors::{StoreError, StoreResult};
use super::migrations;
use super::sql_store::SqlStore;
use super::timeout::execution_ceiling;
use crate::config::Config;
use crate::model::{Mapping, SavedQuery, SavedQueryRevision};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;
use tracing::{debug, error, info};

/// Operation contract consumed by the query-serving gateway.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn find_mappings_for_tenant(&self, tenant_id: &str) -> StoreResult<Vec<Mapping>>;

    async fn set_mapping(&self, tenant_id: &str, resource_name: &str, url: &str)
        -> StoreResult<()>;

    async fn find_all_tenants(&self) -> StoreResult<Vec<String>>;

    async fn find_query(
        &self,
        namespace: &str,
        name: &str,
        revision: u64,
    ) -> StoreResult<SavedQueryRevision>;

    async fn find_all_namespaces(&self) -> StoreResult<Vec<String>>;

    async fn find_queries_for_namespace(
        &self,
        namespace: &str,
        archived: bool,
    ) -> StoreResult<Vec<SavedQuery>>;

    async fn find_query_with_all_revisions(
        &self,
        namespace: &str,
        name: &str,
        archived: bool,
    ) -> StoreResult<SavedQuery>;

    async fn create_query_revision(
        &self,
        namespace: &str,
        name: &str,
        text: &str,
    ) -> StoreResult<()>;

    async fn update_query_archiving(
        &self,
        namespace: &str,
        name: &str,
        archived: bool,
    ) -> StoreResult<()>;

    async fn update_revision_archiving(
        &self,
        namespace: &str,
        name: &str,
        revision: u64,
        archived: bool,
    ) -> StoreResult<()>;
}

/// SQLite-backed implementation of the [`Datastore`] contract.
pub struct Database {
    store: SqlStore,
    mappings_timeout: Duration,
    query_timeout: Duration,
}

/// Open the store described by `config`.
///
/// Returns `Ok(None)` when the database section is disabled or has no path
/// configured; both mean "run without a persistent store", not an error.
pub fn open(config: &Config) -> StoreResult<Option<Database>> {
    let db = &config.database;

    if !db.enabled {
        info!("query store disabled by configuration");
        return Ok(None);
    }
    let Some(path) = &db.path else {
        info!("query store path not configured");
        return Ok(None);
    };

    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(db.pool_size)
        .connection_timeout(db.connection_timeout)
        .build(manager)
        .map_err(|e| StoreError::Communication(format!("failed to create connection pool: {}", e)))?;

    migrations::migrate(&pool)?;

    info!(
        path = %path.display(),
        mappings_read_timeout = ?db.mappings_read_timeout,
        query_read_timeout = ?db.query_read_timeout,
        "query store opened"
    );

    Ok(Some(Database::new(
        SqlStore::new(pool),
        db.mappings_read_timeout,
        db.query_read_timeout,
    )))
}

impl Database {
    pub(crate) fn new(store: SqlStore, mappings_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            store,
            mappings_timeout,
            query_timeout,
        }
    }

    /// Run one blocking store operation under the configured timeout. The
    /// engine-side ceiling is derived once here and handed to the store;
    /// zero propagates as "unbounded" on both levels.
    async fn run_bounded<T, F>(&self, op: &'static str, timeout: Duration, task: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SqlStore, Duration) -> StoreResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        let ceiling = execution_ceiling(timeout);
        debug!(op, timeout = ?timeout, ceiling = ?ceiling, "operation timeout defined");

        let work = tokio::task::spawn_blocking(move || task(store, ceiling));

        let joined = if timeout.is_zero() {
            work.await
        } else {
            match tokio::time::timeout(timeout, work).await {
                Ok(joined) => joined,
                Err(_) => {
                    error!(op, timeout = ?timeout, "store operation exceeded timeout");
                    return Err(StoreError::Communication(format!(
                        "{} timed out after {:?}",
                        op, timeout
                    )));
                }
            }
        };

        let result = joined
            .map_err(|e| StoreError::Communication(format!("task join error: {}", e)))?;

        if let Err(e) = &result {
            error!(op, error = %e, "store operation failed");
        }
        result
    }
}

#[async_trait]
impl Datastore for Database {
    async fn find_mappings_for_tenant(&self, tenant_id: &str) -> StoreResult<Vec<Mapping>> {
        let tenant_id = tenant_id.to_string();
        self.run_bounded(
            "find_mappings_for_tenant",
            self.mappings_timeout,
            move |store, ceiling| store.find_mappings_for_tenant(&tenant_id, ceiling),
        )
        .await
    }

    async fn set_mapping(
        &self,
        tenant_id: &str,
        resource_name: &str,
        url: &str,
    ) -> StoreResult<()> {
        let tenant_id = tenant_id.to_string();
        let resource_name = resource_name.to_string();
        let url = url.to_string();
        self.run_bounded("set_mapping", self.mappings_timeout, move |store, ceiling| {
            store.set_mapping(&tenant_id, &resource_name, &url, ceiling)
        })
        .await
    }

    async fn find_all_tenants(&self) -> StoreResult<Vec<String>> {
        self.run_bounded(
            "find_all_tenants",
            self.mappings_timeout,
            move |store, ceiling| store.find_all_tenants(ceiling),
        )
        .await
    }

    async fn find_query(
        &self,
        namespace: &str,
        name: &str,
        revision: u64,
    ) -> StoreResult<SavedQueryRevision> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        self.run_bounded("find_query", self.query_timeout, move |store, ceiling| {
            store.find_query(&namespace, &name, revision, ceiling)
        })
        .await
    }

    async fn find_all_namespaces(&self) -> StoreResult<Vec<String>> {
        self.run_bounded(
            "find_all_namespaces",
            self.query_timeout,
            move |store, ceiling| store.find_all_namespaces(ceiling),
        )
        .await
    }

    async fn find_queries_for_namespace(
        &self,
        namespace: &str,
        archived: bool,
    ) -> StoreResult<Vec<SavedQuery>> {
        let namespace = namespace.to_string();
        self.run_bounded(
            "find_queries_for_namespace",
            self.query_timeout,
            move |store, ceiling| store.find_queries_for_namespace(&namespace, archived, ceiling),
        )
        .await
    }

    async fn find_query_with_all_revisions(
        &self,
        namespace: &str,
        name: &str,
        archived: bool,
    ) -> StoreResult<SavedQuery> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        self.run_bounded(
            "find_query_with_all_revisions",
            self.query_timeout,
            move |store, ceiling| {
                store.find_query_with_all_revisions(&namespace, &name, archived, ceiling)
            },
        )
        .await
    }

    async fn create_query_revision(
        &self,
        namespace: &str,
        name: &str,
        text: &str,
    ) -> StoreResult<()> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        let text = text.to_string();
        self.run_bounded(
            "create_query_revision",
            self.query_timeout,
            move |store, ceiling| store.create_query_revision(&namespace, &name, &text, ceiling),
        )
        .await
    }

    async fn update_query_archiving(
        &self,
        namespace: &str,
        name: &str,
        archived: bool,
    ) -> StoreResult<()> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        self.run_bounded(
            "update_query_archiving",
            self.query_timeout,
            move |store, ceiling| store.update_query_archiving(&namespace, &name, archived, ceiling),
        )
        .await
    }

    async fn update_revision_archiving(
        &self,
        namespace: &str,
        name: &str,
        revision: u64,
        archived: bool,
    ) -> StoreResult<()> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        self.run_bounded(
            "update_revision_archiving",
            self.query_timeout,
            move |store, ceiling| {
                store.update_revision_archiving(&namespace, &name, revision, archived, ceiling)
            },
        )
        .await
    }
}
