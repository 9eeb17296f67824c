//! Primary on-device location service reached through the SL4A facade.
//!
//! SL4A exposes a newline-delimited JSON-RPC server on `AP_HOST:AP_PORT`.
//! Each request is `{"id":n,"method":m,"params":[...]}` and each response is
//! `{"id":n,"result":...,"error":...}`.

use crate::{LocationSource, ProviderError, Reading, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Provider tags in order of preference within a single reading.
const PROVIDER_TAGS: [&str; 2] = ["gps", "network"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sl4aEndpoint {
    pub host: String,
    pub port: u16,
    pub handshake: Option<String>,
}

impl Sl4aEndpoint {
    /// Reads `AP_PORT`, `AP_HOST` and `AP_HANDSHAKE`. Returns `None` when no
    /// facade is advertised in the environment.
    pub fn from_env() -> Option<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let port = get("AP_PORT")?.trim().parse::<u16>().ok()?;
        let host = get("AP_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let handshake = get("AP_HANDSHAKE").filter(|h| !h.is_empty());
        Some(Self {
            host,
            port,
            handshake,
        })
    }
}

/// The subset of the on-device location facade the tagger drives.
#[async_trait::async_trait]
pub trait LocatingService: Send + Sync {
    async fn start_locating(&self) -> Result<(), ProviderError>;
    /// Latest readings keyed by provider tag (`gps`, `network`), possibly empty.
    async fn read_location(&self) -> Result<Value, ProviderError>;
    async fn stop_locating(&self) -> Result<(), ProviderError>;
    async fn make_toast(&self, message: &str) -> Result<(), ProviderError>;
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
    /// Bytes of a reply line whose read was cancelled part way.
    pending: Vec<u8>,
}

pub struct Sl4aClient {
    conn: Mutex<Connection>,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
}

impl Sl4aClient {
    pub async fn connect(endpoint: &Sl4aEndpoint) -> Result<Self, ProviderError> {
        let addr = format!("{}:{}", endpoint.host, endpoint.port);
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| ProviderError::Timeout(CONNECT_TIMEOUT))?
            .map_err(|e| ProviderError::Unavailable(format!("sl4a at {addr}: {e}")))?;
        let (read, writer) = stream.into_split();
        let client = Self {
            conn: Mutex::new(Connection {
                reader: BufReader::new(read),
                writer,
                next_id: 0,
                pending: Vec::new(),
            }),
        };
        if let Some(handshake) = &endpoint.handshake {
            client
                .call("_authenticate", &[Value::String(handshake.clone())])
                .await?;
        }
        debug!("connected to sl4a facade at {}", addr);
        Ok(client)
    }

    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, ProviderError> {
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;
        let id = conn.next_id;
        conn.next_id += 1;

        let mut line = serde_json::to_string(&RpcRequest { id, method, params })
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        line.push('\n');
        conn.writer.write_all(line.as_bytes()).await?;
        conn.writer.flush().await?;

        // Replies to calls that were cancelled before reading them are still
        // queued on the stream; drop them until our id comes back.
        let parsed = loop {
            if conn.reader.read_until(b'\n', &mut conn.pending).await? == 0 {
                return Err(ProviderError::RequestFailed(format!(
                    "sl4a closed the connection during {method}"
                )));
            }
            if conn.pending.last() != Some(&b'\n') {
                continue;
            }
            let reply = std::mem::take(&mut conn.pending);
            let parsed: RpcResponse = serde_json::from_slice(&reply).map_err(|e| {
                ProviderError::Malformed(format!("sl4a reply to {method}: {e}"))
            })?;
            if parsed.id == Some(id) {
                break parsed;
            }
            debug!(
                "discarding stale sl4a reply (id {:?}) while waiting for {} (id {})",
                parsed.id, method, id
            );
        };
        if !parsed.error.is_null() {
            return Err(ProviderError::RequestFailed(format!(
                "{method}: {}",
                parsed.error
            )));
        }
        Ok(parsed.result)
    }
}

#[async_trait::async_trait]
impl LocatingService for Sl4aClient {
    async fn start_locating(&self) -> Result<(), ProviderError> {
        self.call("startLocating", &[]).await.map(|_| ())
    }

    async fn read_location(&self) -> Result<Value, ProviderError> {
        self.call("readLocation", &[]).await
    }

    async fn stop_locating(&self) -> Result<(), ProviderError> {
        self.call("stopLocating", &[]).await.map(|_| ())
    }

    async fn make_toast(&self, message: &str) -> Result<(), ProviderError> {
        self.call("makeToast", &[Value::String(message.to_string())])
            .await
            .map(|_| ())
    }
}

/// Picks the first usable provider entry from a `readLocation` result.
///
/// `Ok(None)` means nothing has arrived yet. A present but malformed entry is
/// an error so the stage ends instead of polling on bad data.
pub fn pick_reading(value: &Value) -> Result<Option<Reading>, ProviderError> {
    for tag in PROVIDER_TAGS {
        match value.get(tag) {
            Some(entry) if !entry.is_null() => {
                return Reading::from_json(entry, "latitude", "longitude", tag).map(Some)
            }
            _ => continue,
        }
    }
    Ok(None)
}

/// Polls the location stream until a fix, the deadline, or an error.
pub struct Sl4aSource {
    service: Arc<dyn LocatingService>,
    poll_interval: Duration,
}

impl Sl4aSource {
    pub fn new(service: Arc<dyn LocatingService>, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval,
        }
    }

    async fn poll(&self, budget: Duration) -> Result<Reading, ProviderError> {
        let deadline = Instant::now() + budget;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let value = timeout(remaining.max(self.poll_interval), self.service.read_location())
                .await
                .map_err(|_| ProviderError::Timeout(budget))??;
            if let Some(reading) = pick_reading(&value)? {
                return Ok(reading);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProviderError::Timeout(budget));
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait::async_trait]
impl LocationSource for Sl4aSource {
    fn name(&self) -> &str {
        "sl4a"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::PrimaryService
    }

    async fn locate(&self, budget: Duration) -> Result<Reading, ProviderError> {
        info!("starting sl4a location service");
        let outcome = match self.service.start_locating().await {
            Ok(()) => {
                info!("waiting up to {}s for a fix", budget.as_secs());
                self.poll(budget).await
            }
            Err(e) => {
                warn!("failed to start sl4a location service: {}", e);
                Err(e)
            }
        };

        match timeout(STOP_TIMEOUT, self.service.stop_locating()).await {
            Ok(Ok(())) => debug!("sl4a location service stopped"),
            Ok(Err(e)) => warn!("failed to stop sl4a location service: {}", e),
            Err(_) => warn!("stopping sl4a location service timed out"),
        }
        outcome
    }
}
