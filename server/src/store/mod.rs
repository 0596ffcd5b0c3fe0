//! Connection store: the durable key-value table behind the registry.
//!
//! Stores hold exactly one record per connection id and expose point
//! lookup, upsert, idempotent delete and a paginated full scan. Writes are
//! atomic per key, so concurrent registers and prunes never need a lock.
//! Nothing is cached in-process: every read goes to the backing medium.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;
use shared::{Connection, ConnectionId};

/// One page of an unordered full-table scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub connections: Vec<Connection>,
    /// Opaque resume point; `None` once the scan is exhausted.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Inserts or replaces the record keyed by `connection.id`.
    async fn put(&self, connection: Connection) -> Result<(), StoreError>;

    async fn get(&self, id: &ConnectionId) -> Result<Connection, StoreError>;

    /// Removes the record for `id`. Deleting a missing id is not an error.
    async fn delete(&self, id: &ConnectionId) -> Result<(), StoreError>;

    /// Returns up to `limit` records following `cursor`.
    async fn scan_page(&self, cursor: Option<&str>, limit: usize)
        -> Result<ScanPage, StoreError>;
}
