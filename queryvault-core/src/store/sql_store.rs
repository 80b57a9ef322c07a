//! SQL-based storage for tenant mappings and saved queries
//!
//! Both collections are document-style rows: a key plus a JSON body decoded
//! through the domain layer. Every multi-step mutation (append revision +
//! size bump, archiving cascades) runs inside a single IMMEDIATE
//! transaction so the engine's write lock makes it atomic; a concurrent
//! reader can never observe a half-applied state, and concurrent appends
//! cannot corrupt ordinal addressing.
//!
//! Each operation takes the engine-side execution ceiling derived by
//! [`super::timeout::execution_ceiling`] and applies it as the connection's
//! busy wait; a zero ceiling means unbounded and falls back to the default
//! wait instead of a near-zero one. Note the ceiling bounds only how long
//! the engine waits on a contended write lock, not statement execution
//! itself; the caller-side timeout in the async facade remains the bound
//! on a slow statement.

use super::errors::{StoreError, StoreResult};
use crate::model::{Mapping, QueryDocument, SavedQuery, SavedQueryRevision};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Busy wait used when the caller supplied no deadline.
const DEFAULT_BUSY_WAIT: Duration = Duration::from_secs(30);

/// SQL-backed store for the tenant and query collections
#[derive(Clone)]
pub struct SqlStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SqlStore {
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create a new in-memory store (for testing)
    #[cfg(test)]
    pub fn memory() -> Self {
        let manager = SqliteConnectionManager::memory();
        // A single connection so every operation sees the same in-memory
        // database.
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .expect("Failed to create pool");
        super::migrations::migrate(&pool).expect("Migration failed");
        Self::new(pool)
    }

    fn connection(
        &self,
        ceiling: Duration,
    ) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        let conn = self.pool.get().map_err(|e| {
            StoreError::Communication(format!("failed to get connection: {}", e))
        })?;

        let busy_wait = if ceiling.is_zero() {
            DEFAULT_BUSY_WAIT
        } else {
            ceiling
        };
        conn.busy_timeout(busy_wait)?;

        Ok(conn)
    }

    // ===== Tenant mappings =====

    /// Fetch a tenant's resource bindings. A binding that fails validation
    /// is dropped with a warning; one malformed entry must not block
    /// resolution of the rest.
    pub fn find_mappings_for_tenant(
        &self,
        tenant_id: &str,
        ceiling: Duration,
    ) -> StoreResult<Vec<Mapping>> {
        let conn = self.connection(ceiling)?;

        let raw: Option<String> = conn
            .query_row(
                "SELECT doc FROM tenants WHERE id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or_else(|| StoreError::MappingsNotFound {
            tenant: tenant_id.to_string(),
        })?;

        let bindings: HashMap<String, serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Decode(format!("tenant {} document: {}", tenant_id, e)))?;

        let mut result = Vec::with_capacity(bindings.len());
        for (resource_name, value) in bindings {
            let Some(url) = value.as_str() else {
                warn!(
                    tenant = tenant_id,
                    resource = %resource_name,
                    "dropping non-string mapping binding"
                );
                continue;
            };
            match Mapping::new(&resource_name, url) {
                Ok(mapping) => result.push(mapping),
                Err(e) => {
                    warn!(
                        tenant = tenant_id,
                        resource = %resource_name,
                        error = %e,
                        "dropping invalid mapping binding"
                    );
                }
            }
        }

        Ok(result)
    }

    /// Upsert exactly one binding, creating the tenant document when
    /// absent and leaving every other binding untouched.
    pub fn set_mapping(
        &self,
        tenant_id: &str,
        resource_name: &str,
        url: &str,
        ceiling: Duration,
    ) -> StoreResult<()> {
        let mut conn = self.connection(ceiling)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT doc FROM tenants WHERE id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )
            .optional()?;

        let mut bindings: serde_json::Map<String, serde_json::Value> = match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::Decode(format!("tenant {} document: {}", tenant_id, e))
            })?,
            None => serde_json::Map::new(),
        };

        bindings.insert(
            resource_name.to_string(),
            serde_json::Value::String(url.to_string()),
        );

        let doc = serde_json::to_string(&bindings).map_err(|e| {
            StoreError::Communication(format!("failed to encode tenant document: {}", e))
        })?;

        tx.execute(
            "INSERT INTO tenants (id, doc) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
            params![tenant_id, doc],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// All tenant ids. An empty store is an empty vec, not an error.
    pub fn find_all_tenants(&self, ceiling: Duration) -> StoreResult<Vec<String>> {
        let conn = self.connection(ceiling)?;

        let mut stmt = conn.prepare("SELECT id FROM tenants ORDER BY id")?;
        let tenants = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(tenants)
    }

    // ===== Saved queries =====

    fn fetch_query(
        conn: &Connection,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<QueryDocument>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT doc FROM queries WHERE namespace = ?1 AND name = ?2",
                params![namespace, name],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            None => Ok(None),
            Some(raw) => QueryDocument::decode(&raw).map(Some).map_err(|e| {
                StoreError::Decode(format!("query {}/{} document: {}", namespace, name, e))
            }),
        }
    }

    fn encode_query(namespace: &str, name: &str, doc: &QueryDocument) -> StoreResult<String> {
        doc.encode().map_err(|e| {
            StoreError::Communication(format!(
                "failed to encode query {}/{} document: {}",
                namespace, name, e
            ))
        })
    }

    /// Read one revision by its 1-based ordinal.
    pub fn find_query(
        &self,
        namespace: &str,
        name: &str,
        revision: u64,
        ceiling: Duration,
    ) -> StoreResult<SavedQueryRevision> {
        let conn = self.connection(ceiling)?;

        let doc = Self::fetch_query(&conn, namespace, name)?.ok_or_else(|| {
            StoreError::QueryNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        })?;

        let index = doc
            .revision_index(revision)
            .ok_or_else(|| StoreError::InvalidRevision {
                namespace: namespace.to_string(),
                name: name.to_string(),
                requested: revision,
                size: doc.size,
            })?;

        let record = &doc.revisions[index];
        Ok(SavedQueryRevision {
            ordinal: revision,
            text: record.text.clone(),
            archived: record.archived,
        })
    }

    /// Distinct namespaces across all query documents.
    pub fn find_all_namespaces(&self, ceiling: Duration) -> StoreResult<Vec<String>> {
        let conn = self.connection(ceiling)?;

        let mut stmt =
            conn.prepare("SELECT DISTINCT namespace FROM queries ORDER BY namespace")?;
        let namespaces = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(namespaces)
    }

    /// All queries in a namespace visible under the requested archiving
    /// state, each with its revisions filtered to that state. A namespace
    /// with queries but no matches yields an empty vec; only a namespace
    /// with no query documents at all is an error.
    pub fn find_queries_for_namespace(
        &self,
        namespace: &str,
        archived: bool,
        ceiling: Duration,
    ) -> StoreResult<Vec<SavedQuery>> {
        let conn = self.connection(ceiling)?;

        let mut stmt =
            conn.prepare("SELECT name, doc FROM queries WHERE namespace = ?1 ORDER BY name")?;
        let rows = stmt
            .query_map(params![namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Err(StoreError::NamespaceNotFound {
                namespace: namespace.to_string(),
            });
        }

        let mut result = Vec::new();
        for (name, raw) in rows {
            let doc = QueryDocument::decode(&raw).map_err(|e| {
                StoreError::Decode(format!("query {}/{} document: {}", namespace, name, e))
            })?;
            if doc.matches_archived(archived) {
                result.push(doc.to_saved_query(namespace, &name, archived));
            }
        }

        Ok(result)
    }

    /// One query with its revisions filtered to the requested archiving
    /// state.
    pub fn find_query_with_all_revisions(
        &self,
        namespace: &str,
        name: &str,
        archived: bool,
        ceiling: Duration,
    ) -> StoreResult<SavedQuery> {
        let conn = self.connection(ceiling)?;

        let doc = Self::fetch_query(&conn, namespace, name)?.ok_or_else(|| {
            StoreError::QueryNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        })?;

        Ok(doc.to_saved_query(namespace, name, archived))
    }

    /// Append a revision, creating the query document on first write. The
    /// size bump and the revision append commit together.
    pub fn create_query_revision(
        &self,
        namespace: &str,
        name: &str,
        text: &str,
        ceiling: Duration,
    ) -> StoreResult<()> {
        let mut conn = self.connection(ceiling)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut doc = Self::fetch_query(&tx, namespace, name)?.unwrap_or_default();
        doc.append_revision(text.to_string());
        let raw = Self::encode_query(namespace, name, &doc)?;

        tx.execute(
            "INSERT INTO queries (namespace, name, doc) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, name) DO UPDATE SET doc = excluded.doc",
            params![namespace, name, raw],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Set the document-level archived flag, cascading per the archiving
    /// rules. A missing document is NotFound, never a silent success.
    pub fn update_query_archiving(
        &self,
        namespace: &str,
        name: &str,
        archived: bool,
        ceiling: Duration,
    ) -> StoreResult<()> {
        let mut conn = self.connection(ceiling)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut doc = Self::fetch_query(&tx, namespace, name)?.ok_or_else(|| {
            StoreError::QueryNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        })?;

        doc.set_document_archived(archived);
        let raw = Self::encode_query(namespace, name, &doc)?;

        tx.execute(
            "UPDATE queries SET doc = ?3 WHERE namespace = ?1 AND name = ?2",
            params![namespace, name, raw],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Set one revision's archived flag by ordinal, cascading per the
    /// archiving rules.
    pub fn update_revision_archiving(
        &self,
        namespace: &str,
        name: &str,
        revision: u64,
        archived: bool,
        ceiling: Duration,
    ) -> StoreResult<()> {
        let mut conn = self.connection(ceiling)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut doc = Self::fetch_query(&tx, namespace, name)?.ok_or_else(|| {
            StoreError::QueryNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        })?;

        if !doc.set_revision_archived(revision, archived) {
            return Err(StoreError::InvalidRevision {
                namespace: namespace.to_string(),
                name: name.to_string(),
                requested: revision,
                size: doc.size,
            });
        }
        let raw = Self::encode_query(namespace, name, &doc)?;

        tx.execute(
            "UPDATE queries SET doc = ?3 WHERE namespace = ?1 AND name = ?2",
            params![namespace, name, raw],
        )?;
        tx.commit()?;

        Ok(())
    }
}
