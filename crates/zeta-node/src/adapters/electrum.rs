//! # Electrum Header Source
//!
//! JSON-RPC client for an Electrum server over plain TCP. One request or
//! response per line.
//!
//! ```text
//! request()  ──register id──→ pending ──write line──→ server
//!                                ↑
//! reader task ←──read line──── server
//!   ├─ has id      → pending.remove(id) → oneshot
//!   └─ notification → subscribers (mpsc)
//! ```
//!
//! When the connection drops, pending requests fail and subscriptions
//! close.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zeta_header_sync::{
    BulkHeaders, HeaderNotification, HeaderSource, HeaderSubscription, HeaderSyncError,
    TipHeader,
};

/// Protocol version requested with `server.version`.
pub const PROTOCOL_VERSION: &str = "1.4";

const HEADERS_SUBSCRIBE: &str = "blockchain.headers.subscribe";

type RpcResult = Result<Value, String>;
type PendingMap = HashMap<u64, oneshot::Sender<RpcResult>>;

/// State shared with the reader task.
#[derive(Default)]
struct Shared {
    pending: Mutex<PendingMap>,
    subscribers: Mutex<Vec<mpsc::Sender<HeaderNotification>>>,
}

impl Shared {
    /// Fail every waiter and close every subscription.
    fn disconnect(&self) {
        self.pending.lock().clear();
        self.subscribers.lock().clear();
    }

    fn dispatch(&self, line: &str) {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("[zeta-node] Unparseable Electrum message: {}", e);
                return;
            }
        };

        if let Some(id) = message.get("id").and_then(Value::as_u64) {
            let result = match message.get("error") {
                Some(error) if !error.is_null() => Err(error.to_string()),
                _ => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
            };
            match self.pending.lock().remove(&id) {
                Some(waiter) => {
                    // Waiter gone means the request timed out.
                    let _ = waiter.send(result);
                }
                None => debug!("[zeta-node] Response for unknown request {}", id),
            }
            return;
        }

        if message.get("method").and_then(Value::as_str) == Some(HEADERS_SUBSCRIBE) {
            let params = message.get("params").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<HeaderNotification>(params) {
                Ok(notification) => {
                    let mut subscribers = self.subscribers.lock();
                    subscribers.retain(|tx| match tx.try_send(notification.clone()) {
                        Ok(()) => true,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!("[zeta-node] Subscriber lagging, dropped a tip");
                            true
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => false,
                    });
                }
                Err(e) => warn!("[zeta-node] Malformed header notification: {}", e),
            }
        }
    }
}

/// Electrum connection implementing [`HeaderSource`].
pub struct ElectrumClient {
    address: String,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    next_id: AtomicU64,
    shared: Arc<Shared>,
    request_timeout: Duration,
    subscription_buffer: usize,
    reader: JoinHandle<()>,
}

impl ElectrumClient {
    /// Connect to `address` (`host:port`) and negotiate the protocol version.
    pub async fn connect(
        address: &str,
        user_agent: &str,
        request_timeout: Duration,
        subscription_buffer: usize,
    ) -> Result<Self, HeaderSyncError> {
        let stream = tokio::time::timeout(request_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| HeaderSyncError::Network(format!("connect to {} timed out", address)))?
            .map_err(|e| HeaderSyncError::Network(format!("connect to {}: {}", address, e)))?;
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared::default());
        let reader = tokio::spawn(read_loop(
            address.to_string(),
            read_half,
            Arc::clone(&shared),
        ));

        let client = Self {
            address: address.to_string(),
            writer: tokio::sync::Mutex::new(write_half),
            next_id: AtomicU64::new(0),
            shared,
            request_timeout,
            subscription_buffer,
            reader,
        };

        let version = client
            .request("server.version", json!([user_agent, PROTOCOL_VERSION]))
            .await?;
        info!("[zeta-node] Connected to {} ({})", address, version);
        Ok(client)
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Keepalive ping.
    pub async fn ping(&self) -> Result<(), HeaderSyncError> {
        self.request("server.ping", json!([])).await.map(|_| ())
    }

    /// Send one request and wait for its response.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, HeaderSyncError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id, tx);

        let mut line = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        })
        .to_string();
        line.push('\n');

        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await
        };
        if let Err(e) = written {
            self.shared.pending.lock().remove(&id);
            return Err(HeaderSyncError::Network(format!(
                "{} {}: write failed: {}",
                self.address, method, e
            )));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(HeaderSyncError::Network(format!(
                "{} {}: {}",
                self.address, method, error
            ))),
            Ok(Err(_)) => Err(HeaderSyncError::Network(format!(
                "{} {}: connection closed",
                self.address, method
            ))),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                Err(HeaderSyncError::Network(format!(
                    "{} {}: timed out",
                    self.address, method
                )))
            }
        }
    }
}

impl Drop for ElectrumClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(address: String, read_half: OwnedReadHalf, shared: Arc<Shared>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => shared.dispatch(&line),
            Ok(None) => {
                warn!("[zeta-node] {} closed the connection", address);
                break;
            }
            Err(e) => {
                warn!("[zeta-node] Read from {} failed: {}", address, e);
                break;
            }
        }
    }
    shared.disconnect();
}

#[async_trait]
impl HeaderSource for ElectrumClient {
    async fn fetch_headers(
        &self,
        start_height: u64,
        count: u64,
    ) -> Result<BulkHeaders, HeaderSyncError> {
        let result = self
            .request("blockchain.block.headers", json!([start_height, count]))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| HeaderSyncError::Serialization(format!("bulk headers: {}", e)))
    }

    async fn subscribe_headers(&self) -> Result<HeaderSubscription, HeaderSyncError> {
        let (tx, receiver) = mpsc::channel(self.subscription_buffer);
        self.shared.subscribers.lock().push(tx);

        let result = self.request(HEADERS_SUBSCRIBE, json!([])).await?;
        let tip: TipHeader = serde_json::from_value(result)
            .map_err(|e| HeaderSyncError::Serialization(format!("subscription tip: {}", e)))?;

        Ok(HeaderSubscription {
            initial: HeaderNotification::Single(tip),
            receiver,
        })
    }

    fn source_id(&self) -> &str {
        &self.address
    }
}
