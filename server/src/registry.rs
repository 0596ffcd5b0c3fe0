//! Connection registry: the only component allowed to mutate the store.
//!
//! The registry turns transport lifecycle events into store writes and
//! presents the store's paginated scan as one logical sequence.

use crate::error::StoreError;
use crate::store::ConnectionStore;
use log::{debug, info};
use shared::{Connection, ConnectionId};
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Registry of deliverable connections.
///
/// Cheap to clone; clones share the underlying store handle.
#[derive(Clone)]
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
    page_size: usize,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many records are pulled per store round trip.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Records `id` as deliverable.
    ///
    /// Re-registering an id replaces its record, refreshing `registered_at`.
    pub async fn register(
        &self,
        id: ConnectionId,
        owner: impl Into<String>,
    ) -> Result<Connection, StoreError> {
        let connection = Connection::new(id, owner);
        self.store.put(connection.clone()).await?;
        info!(
            "Registered connection {} for {}",
            connection.id, connection.owner
        );
        Ok(connection)
    }

    /// Forgets `id`. Removing an id that was never registered, or was already
    /// pruned, succeeds without touching the store's contents.
    pub async fn deregister(&self, id: &ConnectionId) -> Result<(), StoreError> {
        self.store.delete(id).await?;
        info!("Deregistered connection {}", id);
        Ok(())
    }

    pub async fn get(&self, id: &ConnectionId) -> Result<Connection, StoreError> {
        self.store.get(id).await
    }

    /// Returns every registered connection, draining all store pages.
    ///
    /// An empty registry is `Ok(vec![])`, never an error.
    pub async fn list_all(&self) -> Result<Vec<Connection>, StoreError> {
        let mut connections = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .scan_page(cursor.as_deref(), self.page_size)
                .await?;
            pages += 1;
            connections.extend(page.connections);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            "Listed {} connections across {} page(s)",
            connections.len(),
            pages
        );
        Ok(connections)
    }

    /// Connections belonging to `owner`, oldest registration first.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Connection>, StoreError> {
        let mut owned: Vec<Connection> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|conn| conn.owner == owner)
            .collect();
        owned.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(owned)
    }
}
