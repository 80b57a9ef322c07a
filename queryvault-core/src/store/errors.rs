//! Error types for the store subsystem
//!
//! Classification policy: "no matching row" from the engine always becomes
//! the domain-specific NotFound variant, never a generic failure. Every
//! other engine, pool or runtime failure is wrapped as `Communication` with
//! the cause formatted in. A row that exists but does not parse is
//! `Decode`, kept distinct from NotFound at the call site even though both
//! mean "nothing usable" to the caller.

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// No tenant document exists for the given id
    #[error("mappings not found for tenant {tenant}")]
    MappingsNotFound { tenant: String },

    /// No query document exists for (namespace, name)
    #[error("query {namespace}/{name} not found")]
    QueryNotFound { namespace: String, name: String },

    /// The namespace has no query documents at all
    #[error("namespace {namespace} not found")]
    NamespaceNotFound { namespace: String },

    /// Revision ordinal outside [1, size]
    #[error("invalid revision for query {namespace}/{name}: size {size}, given revision {requested}")]
    InvalidRevision {
        namespace: String,
        name: String,
        requested: u64,
        size: u64,
    },

    /// Stored document retrieved but malformed
    #[error("failed to decode stored document: {0}")]
    Decode(String),

    /// Engine reachable but the call failed for any reason other than
    /// "no match"
    #[error("database communication failed: {0}")]
    Communication(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Communication(err.to_string())
    }
}
