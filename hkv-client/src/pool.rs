//! # Node Connections
//!
//! Purpose: Keep one reusable TCP connection per cluster node and run
//! request/reply exchanges on it.
//!
//! ## Design Principles
//! 1. **One Connection Per Node**: Requests to a node are serialized on a
//!    single connection, so `WATCH` and the `EXEC` that depends on it share
//!    server-side connection state.
//! 2. **Minimal Locking**: The node map lock is held only to look up a slot;
//!    the per-node async mutex is held for the round-trip.
//! 3. **Discard On Doubt**: A connection goes back into its slot only after
//!    a clean exchange. Errors, timeouts and cancellation drop it; the next
//!    request reconnects.
//! 4. **Buffer Reuse**: Each connection keeps its own read buffer.
//! 5. **Evict On Discard**: A discarded connection also drops the node's
//!    entry, so nodes that left the topology do not linger in the map.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use hkv_common::{NodeAddr, Value};

use crate::config::ClientConfig;
use crate::resp::decode;
use crate::transport::TransportError;

struct NodeSlot {
    conn: tokio::sync::Mutex<Option<Connection>>,
}

struct PoolInner {
    config: ClientConfig,
    nodes: Mutex<HashMap<NodeAddr, Arc<NodeSlot>>>,
}

/// Connections keyed by node address, created on first use.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: ClientConfig) -> Self {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                nodes: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Writes `frames` to `node`, skips `preamble` replies and returns the
    /// reply after them.
    ///
    /// If the first skipped reply is an error it is returned instead, since
    /// everything after it was not executed as intended.
    pub async fn request(
        &self,
        node: &NodeAddr,
        frames: &[u8],
        preamble: usize,
    ) -> Result<Value, TransportError> {
        let slot = self.slot(node);
        let mut guard = slot.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => Connection::connect(node, &self.inner.config).await?,
        };

        let deadline = self.inner.config.response_timeout();
        let result = match timeout(deadline, conn.request(node, frames, preamble)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                node: node.clone(),
                after: deadline,
            }),
        };

        match &result {
            Ok(_) => *guard = Some(conn),
            Err(err) => {
                warn!(%node, error = %err, "discarding node connection");
                self.evict(node, &slot);
            }
        }
        result
    }

    #[cfg(test)]
    fn tracked_nodes(&self) -> usize {
        self.inner.nodes.lock().len()
    }

    // Forget `node` unless its entry was already replaced by a newer slot.
    fn evict(&self, node: &NodeAddr, slot: &Arc<NodeSlot>) {
        let mut nodes = self.inner.nodes.lock();
        if nodes.get(node).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            nodes.remove(node);
        }
    }

    fn slot(&self, node: &NodeAddr) -> Arc<NodeSlot> {
        let mut nodes = self.inner.nodes.lock();
        nodes
            .entry(node.clone())
            .or_insert_with(|| {
                Arc::new(NodeSlot {
                    conn: tokio::sync::Mutex::new(None),
                })
            })
            .clone()
    }
}

/// Single TCP connection with a reusable read buffer.
struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl Connection {
    async fn connect(node: &NodeAddr, config: &ClientConfig) -> Result<Self, TransportError> {
        let mut delays = config.connect_retry.delays();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match timeout(config.connect_timeout(), TcpStream::connect(node.as_str())).await
            {
                Ok(Ok(stream)) => {
                    // Disable Nagle to keep request latency low for small payloads.
                    stream
                        .set_nodelay(config.nodelay)
                        .map_err(|source| TransportError::Io {
                            node: node.clone(),
                            source,
                        })?;
                    debug!(%node, attempts, "connected");
                    return Ok(Connection {
                        stream,
                        read_buf: BytesMut::with_capacity(8 * 1024),
                    });
                }
                Ok(Err(err)) => err,
                Err(_) => io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            };

            match delays.next() {
                Some(delay) => {
                    debug!(%node, attempts, ?delay, error = %err, "connect failed, retrying");
                    sleep(delay).await;
                }
                None => {
                    return Err(TransportError::Connect {
                        node: node.clone(),
                        attempts,
                        source: err,
                    })
                }
            }
        }
    }

    async fn request(
        &mut self,
        node: &NodeAddr,
        frames: &[u8],
        preamble: usize,
    ) -> Result<Value, TransportError> {
        let io_err = |source| TransportError::Io {
            node: node.clone(),
            source,
        };
        self.stream.write_all(frames).await.map_err(io_err)?;
        self.stream.flush().await.map_err(io_err)?;

        let mut rejected = None;
        for idx in 0..preamble {
            let reply = self.read_value(node).await?;
            if idx == 0 {
                if let Value::Error(err) = reply {
                    rejected = Some(err);
                }
            }
        }
        let reply = self.read_value(node).await?;
        Ok(match rejected {
            Some(err) => Value::Error(err),
            None => reply,
        })
    }

    async fn read_value(&mut self, node: &NodeAddr) -> Result<Value, TransportError> {
        loop {
            let decoded = decode(&mut self.read_buf).map_err(|source| TransportError::Protocol {
                node: node.clone(),
                source,
            })?;
            if let Some(value) = decoded {
                return Ok(value);
            }

            let read = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(|source| TransportError::Io {
                    node: node.clone(),
                    source,
                })?;
            if read == 0 {
                return Err(TransportError::Disconnected { node: node.clone() });
            }
        }
    }
}
