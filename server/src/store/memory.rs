use super::{ConnectionStore, ScanPage};
use crate::error::StoreError;
use async_trait::async_trait;
use shared::{Connection, ConnectionId};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide connection table.
///
/// Clones share the same table, so a dispatcher built from any clone sees
/// every register and deregister made through the others.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<BTreeMap<ConnectionId, Connection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn put(&self, connection: Connection) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(connection.id.clone(), connection);
        Ok(())
    }

    async fn get(&self, id: &ConnectionId) -> Result<Connection, StoreError> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &ConnectionId) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.remove(id);
        Ok(())
    }

    async fn scan_page(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        let limit = limit.max(1);
        let records = self.records.read().await;

        let start = match cursor {
            Some(after) => Bound::Excluded(ConnectionId::from(after)),
            None => Bound::Unbounded,
        };
        let mut remaining = records.range((start, Bound::Unbounded));

        let connections: Vec<Connection> = remaining
            .by_ref()
            .take(limit)
            .map(|(_, conn)| conn.clone())
            .collect();

        let next_cursor = match (remaining.next(), connections.last()) {
            (Some(_), Some(last)) => Some(last.id.as_str().to_string()),
            _ => None,
        };

        Ok(ScanPage {
            connections,
            next_cursor,
        })
    }
}
