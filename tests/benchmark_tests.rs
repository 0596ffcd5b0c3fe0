//! Performance benchmarks for the registry and the broadcast fan-out

use async_trait::async_trait;
use server::dispatcher::BroadcastDispatcher;
use server::error::SendError;
use server::registry::ConnectionRegistry;
use server::sender::TransportSender;
use server::store::{ConnectionStore, FileStore, MemoryStore};
use shared::{Connection, ConnectionId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sender that acknowledges every delivery after a fixed delay
struct DelayedSender {
    delay: Duration,
}

#[async_trait]
impl TransportSender for DelayedSender {
    async fn send(&self, _id: &ConnectionId, _payload: &[u8]) -> Result<(), SendError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

async fn populated_registry(count: usize, page_size: usize) -> ConnectionRegistry {
    let registry = ConnectionRegistry::new(Arc::new(MemoryStore::new())).with_page_size(page_size);
    for i in 0..count {
        registry
            .register(format!("conn-{:05}", i).into(), "anonymous")
            .await
            .unwrap();
    }
    registry
}

/// Benchmarks draining a large registry through many scan pages
#[tokio::test]
async fn benchmark_list_all() {
    let registry = populated_registry(10_000, 100).await;

    let iterations = 10;
    let start = Instant::now();

    for _ in 0..iterations {
        assert_eq!(registry.list_all().await.unwrap().len(), 10_000);
    }

    let duration = start.elapsed();
    println!(
        "list_all: {} iterations over 10k records in {:?} ({:.2} ms/iter)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    assert!(duration.as_secs() < 5);
}

/// Fan-out runs sends concurrently: 500 sends of 20ms each must not take 500 * 20ms
#[tokio::test]
async fn benchmark_concurrent_fanout() {
    let dispatcher = BroadcastDispatcher::new(populated_registry(500, 100).await);
    let sender = DelayedSender {
        delay: Duration::from_millis(20),
    };

    let start = Instant::now();
    let outcome = dispatcher.broadcast(b"tick", &sender).await.unwrap();
    let duration = start.elapsed();

    println!("Fan-out to 500 connections in {:?}", duration);

    assert_eq!(outcome.summary().delivered, 500);
    assert!(duration < Duration::from_secs(2));
}

/// Benchmarks durable writes and a full paginated scan of the file store
#[tokio::test]
async fn benchmark_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let records = 200;
    let start = Instant::now();

    for i in 0..records {
        store
            .put(Connection::new(format!("conn-{}", i).into(), "anonymous"))
            .await
            .unwrap();
    }
    let write_time = start.elapsed();

    let registry = ConnectionRegistry::new(Arc::new(store)).with_page_size(50);
    let scan_start = Instant::now();
    let all = registry.list_all().await.unwrap();
    let scan_time = scan_start.elapsed();

    println!(
        "File store: {} writes in {:?}, full scan in {:?}",
        records, write_time, scan_time
    );

    assert_eq!(all.len(), records);
    assert!(write_time.as_secs() < 10);
    assert!(scan_time.as_secs() < 10);
}
