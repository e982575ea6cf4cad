//! # Transport Seam
//!
//! Purpose: Define what the executor needs from the network layer: deliver
//! a command (or a whole transaction) to a resolved set of nodes and hand
//! back each node's raw reply.
//!
//! The transport owns connections, timeouts and reconnects. It does not
//! interpret replies; abort detection and reconciliation happen above it.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use hkv_common::{NodeAddr, Value};

use crate::command::Cmd;
use crate::resp::RespError;

/// Raw completion of one transaction submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The transport already knows the transaction was dropped by WATCH.
    Aborted,
    /// Raw `EXEC` reply per target node.
    Replies(HashMap<NodeAddr, Value>),
}

/// Network-level failure. The transaction's fate on the server is unknown.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error talking to {node}: {source}")]
    Io {
        node: NodeAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("could not connect to {node} after {attempts} attempt(s): {source}")]
    Connect {
        node: NodeAddr,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("{node} did not reply within {after:?}")]
    Timeout { node: NodeAddr, after: Duration },
    #[error("{node} closed the connection")]
    Disconnected { node: NodeAddr },
    #[error("protocol error from {node}: {source}")]
    Protocol {
        node: NodeAddr,
        #[source]
        source: RespError,
    },
}

impl TransportError {
    /// Node the failure is attributed to.
    pub fn node(&self) -> &NodeAddr {
        match self {
            TransportError::Io { node, .. }
            | TransportError::Connect { node, .. }
            | TransportError::Timeout { node, .. }
            | TransportError::Disconnected { node }
            | TransportError::Protocol { node, .. } => node,
        }
    }
}

/// Delivers requests to cluster nodes.
///
/// Implementations must not retry a request that may already have reached
/// a node; the executor reports the failure to the caller instead.
pub trait Transport: Send + Sync {
    /// Runs `commands` between `MULTI` and `EXEC` on every node in `targets`
    /// and returns each node's raw `EXEC` reply.
    fn submit(
        &self,
        commands: &[Cmd],
        targets: &[NodeAddr],
    ) -> impl Future<Output = Result<Completion, TransportError>> + Send;

    /// Sends a single command to every node in `targets`.
    fn send(
        &self,
        command: &Cmd,
        targets: &[NodeAddr],
    ) -> impl Future<Output = Result<HashMap<NodeAddr, Value>, TransportError>> + Send;
}
