//! QueryVault core: persistence layer for a query-serving gateway.
//!
//! Exposes two stores over a single SQLite database:
//! - a versioned, archivable saved-query store keyed by (namespace, name)
//! - a tenant store mapping a tenant id to named resource-URL bindings
//!
//! The host obtains a [`Database`] through [`store::open`] and talks to it
//! through the [`Datastore`] contract. Everything is stateless per request;
//! the only shared state is the connection pool and the two read timeouts
//! fixed at construction time.

pub mod config;
pub mod logging;
pub mod model;
pub mod store;

pub use config::{Config, ConfigError, DatabaseConfig};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use model::{Mapping, SavedQuery, SavedQueryRevision};
pub use store::{open, Database, Datastore, StoreError, StoreResult};
