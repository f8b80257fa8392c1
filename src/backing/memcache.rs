//! memcached client speaking the ASCII protocol over a single TCP connection.
//!
//! Only `get` and `set` are implemented, which is all the house store needs.
//! There is no reconnect: once the connection fails the client stays degraded
//! until the process restarts.

use super::{BackingError, BackingStore};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// memcached rejects keys longer than this
const MAX_KEY_LEN: usize = 250;

/// memcached's default item size limit; longer values are never legitimate
const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Key written once after connecting to check the server accepts writes
const PROBE_KEY: &str = "test_key";

/// Expiry for the probe key (seconds)
const PROBE_EXPIRY_SECS: u32 = 3600;

/// memcached connection configuration
#[derive(Clone, Debug, Deserialize)]
pub struct MemcacheConfig {
    /// Set to false to run purely in memory
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Comma separated `host:port` list; only the first entry is used
    #[serde(default = "default_servers")]
    pub servers: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Upper bound on connect and on every individual operation
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_servers() -> String {
    "127.0.0.1:11211".to_string()
}

fn default_timeout_ms() -> u64 {
    500
}

impl Default for MemcacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            servers: default_servers(),
            username: None,
            password: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl MemcacheConfig {
    /// Address actually dialled
    pub fn server(&self) -> &str {
        self.servers
            .split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Username and password, when both are present and non-empty
    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Single-connection memcached client
pub struct MemcacheClient {
    server: String,
    timeout: Duration,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

impl MemcacheClient {
    /// Dial the configured server, authenticate if credentials are set and
    /// write the probe key
    ///
    /// Only the TCP connect can fail this call. Authentication and probe
    /// failures are logged; a probe failure that breaks the connection
    /// leaves the client degraded.
    pub async fn connect(config: &MemcacheConfig) -> Result<Self, BackingError> {
        let server = config.server().to_string();
        info!(server = %server, "Connecting to memcache");

        let stream = timeout(config.timeout(), TcpStream::connect(&server))
            .await
            .map_err(|_| BackingError::Timeout)??;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY on memcache socket");
        }

        let client = Self {
            server,
            timeout: config.timeout(),
            conn: Mutex::new(Some(BufStream::new(stream))),
        };

        match config.credentials() {
            Some((user, pass)) => {
                info!("Memcache credentials present, authenticating");
                match client.store("auth", &format!("{} {}", user, pass), 0).await {
                    Ok(()) => info!("Memcache authentication succeeded"),
                    Err(e) => warn!(error = %e, "Memcache authentication failed"),
                }
            }
            None => debug!("No memcache credentials configured, skipping authentication"),
        }

        match client.store(PROBE_KEY, "0", PROBE_EXPIRY_SECS).await {
            Ok(()) => info!("Setting a test key in memcache worked"),
            Err(e) => warn!(error = %e, "Setting a test key in memcache did not work"),
        }

        Ok(client)
    }

    /// Client that fails every call with [`BackingError::Unavailable`]
    pub fn degraded(config: &MemcacheConfig) -> Self {
        Self {
            server: config.server().to_string(),
            timeout: config.timeout(),
            conn: Mutex::new(None),
        }
    }

    /// True until the connection is lost (or if it was never made)
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    async fn store(&self, key: &str, value: &str, exptime: u32) -> Result<(), BackingError> {
        let mut guard = self.conn.lock().await;
        // Out of the slot while in flight: if this future is dropped midway
        // the half-read stream goes with it and the client stays degraded
        let mut conn = guard.take().ok_or(BackingError::Unavailable)?;

        let result = timeout(self.timeout, store_value(&mut conn, key, value, exptime))
            .await
            .unwrap_or(Err(BackingError::Timeout));

        if result.as_ref().is_err_and(breaks_connection) {
            warn!(server = %self.server, "Dropping memcache connection after failed set");
        } else {
            *guard = Some(conn);
        }
        result
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, BackingError> {
        let mut guard = self.conn.lock().await;
        let mut conn = guard.take().ok_or(BackingError::Unavailable)?;

        let result = timeout(self.timeout, fetch_value(&mut conn, key))
            .await
            .unwrap_or(Err(BackingError::Timeout));

        if result.as_ref().is_err_and(breaks_connection) {
            warn!(server = %self.server, "Dropping memcache connection after failed get");
        } else {
            *guard = Some(conn);
        }
        result
    }
}

#[async_trait]
impl BackingStore for MemcacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>, BackingError> {
        self.fetch(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BackingError> {
        self.store(key, value, 0).await
    }
}

/// Whether the stream position can still be trusted after `error`
fn breaks_connection(error: &BackingError) -> bool {
    !matches!(error, BackingError::Rejected(_))
}

fn validate_key(key: &str) -> Result<(), BackingError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(BackingError::Rejected(format!(
            "key length {} outside 1..={}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(BackingError::Rejected(format!(
            "key '{}' contains whitespace or control characters",
            key.escape_default()
        )));
    }
    Ok(())
}

/// `set <key> 0 <exptime> <bytes>` followed by the data block
async fn store_value<S>(conn: &mut S, key: &str, value: &str, exptime: u32) -> Result<(), BackingError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    validate_key(key)?;

    let header = format!("set {} 0 {} {}\r\n", key, exptime, value.len());
    conn.write_all(header.as_bytes()).await?;
    conn.write_all(value.as_bytes()).await?;
    conn.write_all(b"\r\n").await?;
    conn.flush().await?;

    let reply = read_line(conn).await?;
    match reply.as_str() {
        "STORED" => Ok(()),
        "NOT_STORED" => Err(BackingError::Rejected("NOT_STORED".to_string())),
        other => Err(reply_error(other)),
    }
}

/// `get <key>`, expecting either `END` or one `VALUE` block then `END`
async fn fetch_value<S>(conn: &mut S, key: &str) -> Result<Option<String>, BackingError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    validate_key(key)?;

    conn.write_all(format!("get {}\r\n", key).as_bytes()).await?;
    conn.flush().await?;

    let header = read_line(conn).await?;
    if header == "END" {
        return Ok(None);
    }

    let fields: Vec<&str> = header.split(' ').collect();
    let len = match fields.as_slice() {
        ["VALUE", k, _flags, len] | ["VALUE", k, _flags, len, _] if *k == key => len
            .parse::<usize>()
            .map_err(|_| BackingError::Protocol(format!("bad value length in '{}'", header)))?,
        _ => return Err(reply_error(&header)),
    };

    if len > MAX_VALUE_LEN {
        return Err(BackingError::Protocol(format!(
            "value length {} exceeds {} bytes",
            len, MAX_VALUE_LEN
        )));
    }

    // data block plus its trailing CRLF
    let mut data = vec![0u8; len + 2];
    conn.read_exact(&mut data).await?;
    if &data[len..] != b"\r\n" {
        return Err(BackingError::Protocol("data block not terminated by CRLF".to_string()));
    }
    data.truncate(len);

    let trailer = read_line(conn).await?;
    if trailer != "END" {
        return Err(BackingError::Protocol(format!("expected END, got '{}'", trailer)));
    }

    String::from_utf8(data)
        .map(Some)
        .map_err(|_| BackingError::Protocol("value is not valid UTF-8".to_string()))
}

/// Read one CRLF terminated reply line, without the terminator
async fn read_line<S>(conn: &mut S) -> Result<String, BackingError>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if conn.read_line(&mut line).await? == 0 {
        return Err(BackingError::Io("connection closed by server".to_string()));
    }
    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(line)
}

fn reply_error(line: &str) -> BackingError {
    if let Some(msg) = line.strip_prefix("SERVER_ERROR") {
        BackingError::Rejected(format!("server error:{}", msg))
    } else if let Some(msg) = line.strip_prefix("CLIENT_ERROR") {
        BackingError::Protocol(format!("client error:{}", msg))
    } else if line == "ERROR" {
        BackingError::Protocol("server did not recognise the command".to_string())
    } else {
        BackingError::Protocol(format!("unexpected reply '{}'", line))
    }
}
