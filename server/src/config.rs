//! Command line and environment configuration for the relay server.

use crate::error::StoreError;
use crate::store::{ConnectionStore, FileStore, MemoryStore};
use clap::{Parser, ValueEnum};
use shared::DEFAULT_OWNER;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process-local table, lost on restart
    Memory,
    /// One file per connection under --store-dir
    File,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time message fan-out relay")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "RELAY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, env = "RELAY_PORT", default_value = "8080")]
    pub port: u16,

    /// Connection store backend
    #[arg(long, env = "RELAY_STORE", value_enum, default_value = "memory")]
    pub store: StoreKind,

    /// Directory used by the file store
    #[arg(long, env = "RELAY_STORE_DIR", default_value = "relay-connections")]
    pub store_dir: PathBuf,

    /// Relay name stamped on connection ids; defaults to the bound address.
    /// Give every relay sharing a --store-dir its own stable name
    #[arg(long, env = "RELAY_NAME")]
    pub name: Option<String>,

    /// Owner label recorded for new connections
    #[arg(long, env = "RELAY_OWNER", default_value = DEFAULT_OWNER)]
    pub owner: String,

    /// Per-send timeout in milliseconds
    #[arg(long, env = "RELAY_SEND_TIMEOUT_MS", default_value = "2000")]
    pub send_timeout_ms: u64,

    /// Close sessions that have been silent for this many seconds
    #[arg(long, env = "RELAY_IDLE_TIMEOUT_SECS", default_value = "30")]
    pub idle_timeout_secs: u64,

    /// Maximum number of concurrent sessions
    #[arg(long, env = "RELAY_MAX_SESSIONS", default_value = "1024")]
    pub max_sessions: usize,

    /// Records fetched per store scan page
    #[arg(long, env = "RELAY_PAGE_SIZE", default_value = "100")]
    pub page_size: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Opens the configured connection store.
    pub async fn open_store(&self) -> Result<Arc<dyn ConnectionStore>, StoreError> {
        match self.store {
            StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreKind::File => Ok(Arc::new(FileStore::open(&self.store_dir).await?)),
        }
    }
}
