//! # TCP Transport
//!
//! `Transport` over plain TCP: frames each request in RESP2, sends it to
//! every target concurrently and collects the raw replies per node.

use std::collections::HashMap;

use futures::future::try_join_all;
use tracing::trace;

use hkv_common::{NodeAddr, Value};

use crate::command::Cmd;
use crate::config::ClientConfig;
use crate::pool::ConnectionPool;
use crate::transport::{Completion, Transport, TransportError};

/// Transport holding one connection per node.
#[derive(Clone)]
pub struct TcpTransport {
    pool: ConnectionPool,
}

impl TcpTransport {
    pub fn new(config: ClientConfig) -> Self {
        TcpTransport {
            pool: ConnectionPool::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.pool.config()
    }

    async fn fan_out(
        &self,
        frames: &[u8],
        preamble: usize,
        targets: &[NodeAddr],
    ) -> Result<HashMap<NodeAddr, Value>, TransportError> {
        let replies = try_join_all(targets.iter().map(|node| async move {
            let reply = self.pool.request(node, frames, preamble).await?;
            trace!(%node, "reply received");
            Ok::<_, TransportError>((node.clone(), reply))
        }))
        .await?;
        Ok(replies.into_iter().collect())
    }
}

impl Transport for TcpTransport {
    async fn submit(
        &self,
        commands: &[Cmd],
        targets: &[NodeAddr],
    ) -> Result<Completion, TransportError> {
        // MULTI, one QUEUED per command, then the EXEC reply we keep.
        let mut frames = Vec::with_capacity(64 * (commands.len() + 2));
        Cmd::new("MULTI").write_frame(&mut frames);
        for cmd in commands {
            cmd.write_frame(&mut frames);
        }
        Cmd::new("EXEC").write_frame(&mut frames);

        let replies = self.fan_out(&frames, commands.len() + 1, targets).await?;
        Ok(Completion::Replies(replies))
    }

    async fn send(
        &self,
        command: &Cmd,
        targets: &[NodeAddr],
    ) -> Result<HashMap<NodeAddr, Value>, TransportError> {
        let mut frames = Vec::with_capacity(64);
        command.write_frame(&mut frames);
        self.fan_out(&frames, 0, targets).await
    }
}
