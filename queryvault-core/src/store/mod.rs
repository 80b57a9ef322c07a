//! Persistence layer for saved queries and tenant mappings
//!
//! Layering, bottom up:
//! - `timeout` — derives the engine-side execution ceiling from a caller
//!   timeout
//! - `migrations` — versioned schema for the two document collections
//! - `sql_store` — synchronous SQL operations, one transaction per mutation
//! - `database` — async facade, timeouts, and the [`Datastore`] contract
//!   the gateway consumes

mod database;
mod errors;
mod migrations;
mod sql_store;
mod timeout;

pub use database::{open, Database, Datastore};
pub use errors::{StoreError, StoreResult};
pub use migrations::{migrate, CURRENT_SCHEMA_VERSION};
pub use sql_store::SqlStore;
pub use timeout::execution_ceiling;
