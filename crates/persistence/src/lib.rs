#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Queue persistence (spec §4.7): a relational store for the pending
//! transfer forest, so queued file transfers survive a restart. Mirrors
//! upstream's `servers`/`files`/`local_paths`/`remote_paths` schema and
//! its `ALTER TABLE ... ADD COLUMN` migration style rather than
//! reaching for an ORM or a schema-migration framework.

mod paths;
mod schema;
mod store;

pub use schema::SCHEMA_VERSION;
pub use store::{QueueStorage, StoredTransfer};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("queue database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
