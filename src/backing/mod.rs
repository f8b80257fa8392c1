// Best-effort durable backing for the house state

mod memcache;
mod memory;

pub use memcache::{MemcacheClient, MemcacheConfig};
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Key the packed state vector is stored under
pub const STATE_KEY: &str = "state";

/// Minimal key-value contract the house store persists through
///
/// Implementations are free to fail; callers treat every error as
/// "persistence unavailable" and carry on in memory.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Fetch a value. `Ok(None)` means the key is not present.
    async fn get(&self, key: &str) -> Result<Option<String>, BackingError>;

    /// Store a value with no expiry
    async fn set(&self, key: &str, value: &str) -> Result<(), BackingError>;
}

/// Backing store errors
#[derive(Debug, PartialEq, Clone)]
pub enum BackingError {
    /// Never connected, or the connection was dropped after an earlier failure
    Unavailable,
    /// Operation did not finish within the configured timeout
    Timeout,
    /// Socket-level failure
    Io(String),
    /// Server replied with something other than what the protocol allows
    Protocol(String),
    /// Server understood the request and refused it
    Rejected(String),
}

impl fmt::Display for BackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackingError::Unavailable => write!(f, "backing store unavailable"),
            BackingError::Timeout => write!(f, "backing store operation timed out"),
            BackingError::Io(msg) => write!(f, "backing store I/O error: {}", msg),
            BackingError::Protocol(msg) => write!(f, "backing store protocol error: {}", msg),
            BackingError::Rejected(msg) => write!(f, "backing store rejected request: {}", msg),
        }
    }
}

impl std::error::Error for BackingError {}

impl From<std::io::Error> for BackingError {
    fn from(e: std::io::Error) -> Self {
        BackingError::Io(e.to_string())
    }
}

/// Build the backing store described by `config`
///
/// Returns `None` when persistence is switched off. A memcached server that
/// cannot be reached still yields a (degraded) client so that the failure is
/// visible in the logs on every write rather than silently ignored.
pub async fn connect(config: &MemcacheConfig) -> Option<Arc<dyn BackingStore>> {
    if !config.enabled {
        info!("Memcache disabled, running with in-memory state only");
        return None;
    }

    let client = match MemcacheClient::connect(config).await {
        Ok(client) => {
            info!(server = %config.server(), "Memcache is available");
            client
        }
        Err(e) => {
            warn!(
                server = %config.server(),
                error = %e,
                "Memcache isn't available, state will not survive restarts"
            );
            MemcacheClient::degraded(config)
        }
    };

    Some(Arc::new(client))
}
