//! Domain types for the QueryVault stores
//!
//! `mapping` holds the tenant-side value types, `query` the saved-query
//! document model and its archiving rules. Both are plain data plus pure
//! functions; everything database-flavored lives in [`crate::store`].

mod mapping;
mod query;

pub use mapping::{Mapping, MappingError};
pub use query::{QueryDocument, RevisionRecord, SavedQuery, SavedQueryRevision};
