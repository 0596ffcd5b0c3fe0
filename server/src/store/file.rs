use super::{ConnectionStore, ScanPage};
use crate::error::StoreError;
use async_trait::async_trait;
use log::{debug, warn};
use shared::{Connection, ConnectionId};
use std::collections::BinaryHeap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const RECORD_SUFFIX: &str = ".conn";
/// Longest id whose record and temp file names fit a 255-byte file name.
pub const MAX_ID_BYTES: usize = 100;

/// Directory-backed connection table.
///
/// Each record lives in its own bincode file named after the hex-encoded
/// connection id. A write lands in a temporary file first and is renamed
/// into place, so readers never observe a half-written record. Any number
/// of relays may share one directory as long as each runs under its own
/// relay name, since a relay only prunes connections it assigned itself.
///
/// Each [`scan_page`](ConnectionStore::scan_page) lists the whole directory
/// but keeps at most one page of names in memory, so draining the store
/// costs one directory listing per page.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the table at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!("Opened file store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_name(id: &ConnectionId) -> String {
        let hex: String = id
            .as_str()
            .bytes()
            .map(|b| format!("{:02x}", b))
            .collect();
        format!("{}{}", hex, RECORD_SUFFIX)
    }

    fn check_id(id: &ConnectionId) -> Result<(), StoreError> {
        if id.as_str().len() > MAX_ID_BYTES {
            return Err(StoreError::Rejected {
                id: id.clone(),
                reason: format!("longer than {} bytes", MAX_ID_BYTES),
            });
        }
        Ok(())
    }

    fn is_record_name(name: &str) -> bool {
        !name.starts_with('.') && name.ends_with(RECORD_SUFFIX)
    }

    async fn read_record(path: &Path) -> Result<Option<Connection>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => match bincode::deserialize::<Connection>(&bytes) {
                Ok(conn) => Ok(Some(conn)),
                Err(e) => {
                    warn!("Skipping undecodable record {}: {}", path.display(), e);
                    Ok(None)
                }
            },
            // Deleted between listing and reading
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConnectionStore for FileStore {
    async fn put(&self, connection: Connection) -> Result<(), StoreError> {
        Self::check_id(&connection.id)?;
        let bytes = bincode::serialize(&connection)
            .map_err(|e| StoreError::Unavailable(format!("encode failed: {}", e)))?;

        let name = Self::record_name(&connection.id);
        let tmp = self
            .dir
            .join(format!(".{}.{:016x}.tmp", name, rand::random::<u64>()));

        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, self.dir.join(&name)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, id: &ConnectionId) -> Result<Connection, StoreError> {
        if Self::check_id(id).is_err() {
            return Err(StoreError::NotFound(id.clone()));
        }
        let path = self.dir.join(Self::record_name(id));
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        bincode::deserialize(&bytes)
            .map_err(|e| StoreError::Unavailable(format!("corrupt record for {}: {}", id, e)))
    }

    async fn delete(&self, id: &ConnectionId) -> Result<(), StoreError> {
        // Never stored, so already absent
        if Self::check_id(id).is_err() {
            return Ok(());
        }
        match fs::remove_file(self.dir.join(Self::record_name(id))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan_page(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        let limit = limit.max(1);

        // Max-heap of the `limit + 1` smallest names after the cursor
        let mut smallest = BinaryHeap::with_capacity(limit + 1);
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if Self::is_record_name(name) && cursor.map_or(true, |after| name > after) {
                    smallest.push(name.to_string());
                    if smallest.len() > limit + 1 {
                        smallest.pop();
                    }
                }
            }
        }
        let mut names = smallest.into_sorted_vec();

        let has_more = names.len() > limit;
        names.truncate(limit);

        let mut connections = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(conn) = Self::read_record(&self.dir.join(name)).await? {
                connections.push(conn);
            }
        }

        let next_cursor = if has_more { names.pop() } else { None };
        Ok(ScanPage {
            connections,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("connections")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (_dir, store) = open_temp().await;
        let conn = Connection::new("Xy1=".into(), "anonymous");
        store.put(conn.clone()).await.unwrap();

        let found = store.get(&"Xy1=".into()).await.unwrap();
        assert_eq!(found, conn);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = open_temp().await;
        let err = store.get(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = open_temp().await;
        store.put(Connection::new("a".into(), "x")).await.unwrap();

        tokio_test::assert_ok!(store.delete(&"a".into()).await);
        tokio_test::assert_ok!(store.delete(&"a".into()).await);
        assert!(store.get(&"a".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let (dir, store) = open_temp().await;
        store.put(Connection::new("a".into(), "x")).await.unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path().join("connections")).await.unwrap();
        let page = reopened.scan_page(None, 10).await.unwrap();
        assert_eq!(page.connections.len(), 1);
        assert_eq!(page.connections[0].id.as_str(), "a");
    }

    #[tokio::test]
    async fn test_scan_paginates_without_duplicates() {
        let (_dir, store) = open_temp().await;
        for i in 0..5 {
            store
                .put(Connection::new(format!("conn-{}", i).into(), "x"))
                .await
                .unwrap();
        }

        let first = store.scan_page(None, 2).await.unwrap();
        assert_eq!(first.connections.len(), 2);
        let second = store
            .scan_page(first.next_cursor.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.connections.len(), 2);
        let third = store
            .scan_page(second.next_cursor.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(third.connections.len(), 1);
        assert!(third.next_cursor.is_none());

        let mut ids: Vec<String> = first
            .connections
            .iter()
            .chain(&second.connections)
            .chain(&third.connections)
            .map(|c| c.id.to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_scan_skips_corrupt_and_foreign_files() {
        let (_dir, store) = open_temp().await;
        store.put(Connection::new("ok".into(), "x")).await.unwrap();
        fs::write(store.dir().join("ffff.conn"), b"\x01").await.unwrap();
        fs::write(store.dir().join("notes.txt"), b"hi").await.unwrap();

        let page = store.scan_page(None, 10).await.unwrap();
        assert_eq!(page.connections.len(), 1);
        assert_eq!(page.connections[0].id.as_str(), "ok");
    }

    #[tokio::test]
    async fn test_overlong_id_is_rejected() {
        let (_dir, store) = open_temp().await;
        let long = ConnectionId::from("x".repeat(MAX_ID_BYTES + 1));

        let err = store
            .put(Connection::new(long.clone(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { ref id, .. } if *id == long));
        assert!(matches!(
            store.get(&long).await,
            Err(StoreError::NotFound(_))
        ));
        tokio_test::assert_ok!(store.delete(&long).await);

        let longest = ConnectionId::from("y".repeat(MAX_ID_BYTES));
        tokio_test::assert_ok!(store.put(Connection::new(longest.clone(), "x")).await);
        assert_eq!(store.get(&longest).await.unwrap().id, longest);
    }

    #[tokio::test]
    async fn test_small_pages_walk_names_in_order() {
        let (_dir, store) = open_temp().await;
        for id in ["e", "b", "d", "a", "c"] {
            store.put(Connection::new(id.into(), "x")).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = store.scan_page(cursor.as_deref(), 1).await.unwrap();
            seen.extend(page.connections.into_iter().map(|c| c.id.to_string()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_record() {
        let (_dir, store) = open_temp().await;
        store.put(Connection::new("a".into(), "first")).await.unwrap();
        store.put(Connection::new("a".into(), "second")).await.unwrap();

        let page = store.scan_page(None, 10).await.unwrap();
        assert_eq!(page.connections.len(), 1);
        assert_eq!(page.connections[0].owner, "second");
    }
}
