//! # Cluster Executor
//!
//! Purpose: Run a finished transaction against the node(s) picked by a
//! route, in one round-trip, and hand back a typed outcome.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `ClusterClient` hides routing, transport and
//!    reply shaping behind `exec`/`exec_routed`.
//! 2. **Context Passing**: The client owns its transport and topology
//!    source; there is no process-global state, so independent clients can
//!    coexist.
//! 3. **One Suspension Point**: Everything except the transport call is
//!    synchronous. Dropping the returned future cancels the wait, not
//!    necessarily the transaction.
//! 4. **Translate, Never Retry**: Failures are reported as they happened.
//!
//! ## Flow
//!
//! ```text
//! Transaction ──into_commands──► [Cmd]
//! Route + snapshot + first key ──resolve──► [NodeAddr]
//! Transport::submit ──► Completion ──inspect──► Aborted
//!                                        └─────► reconcile ──► Completed
//! ```

use std::collections::HashMap;
use std::slice;

use thiserror::Error;
use tracing::debug;

use hkv_common::{NodeAddr, Value};

use crate::abort::{inspect, Inspection};
use crate::command::Cmd;
use crate::config::ClientConfig;
use crate::reconcile::{
    reconcile, reconcile_command, reconcile_flat, ClusterValue, CommandResult, ErrorPolicy,
    ReplyError,
};
use crate::routing::{Route, RoutingError};
use crate::topology::TopologyProvider;
use crate::transaction::{BuildError, Transaction};
use crate::transport::{Transport, TransportError};

/// Final outcome of `exec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome<T> {
    /// One entry per command, in transaction order.
    Completed(Vec<T>),
    /// A watched key changed; no command in the transaction took effect.
    Aborted,
}

impl<T> ExecOutcome<T> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ExecOutcome::Aborted)
    }

    pub fn completed(&self) -> Option<&[T]> {
        match self {
            ExecOutcome::Completed(results) => Some(results),
            ExecOutcome::Aborted => None,
        }
    }

    pub fn into_completed(self) -> Option<Vec<T>> {
        match self {
            ExecOutcome::Completed(results) => Some(results),
            ExecOutcome::Aborted => None,
        }
    }
}

/// Errors surfaced by `ClusterClient`.
///
/// An optimistic-concurrency abort is not an error; see `ExecOutcome::Aborted`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid request: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

/// Client handle for transactions and single commands against a cluster
/// (or a standalone server described as a one-node topology).
pub struct ClusterClient<T, P> {
    transport: T,
    topology: P,
    error_policy: ErrorPolicy,
}

impl<T, P> ClusterClient<T, P>
where
    T: Transport,
    P: TopologyProvider,
{
    pub fn new(transport: T, topology: P) -> Self {
        ClusterClient {
            transport,
            topology,
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Builds a client whose result policy comes from `config`.
    ///
    /// The transport is built separately, usually from the same config.
    pub fn with_config(transport: T, topology: P, config: &ClientConfig) -> Self {
        Self::new(transport, topology).with_error_policy(config.error_policy)
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn topology(&self) -> &P {
        &self.topology
    }

    /// Executes `transaction` on the primary owning its first key (or a
    /// random primary) and returns one flat result per command.
    pub async fn exec(
        &self,
        transaction: Transaction,
    ) -> Result<ExecOutcome<CommandResult>, ExecError> {
        let (commands, targets) = self.prepare(transaction, &Route::Default)?;
        let target = targets.first().ok_or(RoutingError::NoNodes)?;
        let target = slice::from_ref(target);

        let replies = match self.submit(&commands, target).await? {
            Some(replies) => replies,
            None => return Ok(ExecOutcome::Aborted),
        };
        let results = reconcile_flat(&target[0], replies, commands.len(), self.error_policy)?;
        Ok(ExecOutcome::Completed(results))
    }

    /// Executes `transaction` on the node(s) selected by `route`.
    ///
    /// Every entry is `Single` when one node was addressed and `Multi`
    /// (in ascending node address order) when several were.
    pub async fn exec_routed(
        &self,
        transaction: Transaction,
        route: Route,
    ) -> Result<ExecOutcome<ClusterValue<CommandResult>>, ExecError> {
        let (commands, targets) = self.prepare(transaction, &route)?;

        let replies = match self.submit(&commands, &targets).await? {
            Some(replies) => replies,
            None => return Ok(ExecOutcome::Aborted),
        };
        let results = reconcile(&targets, replies, commands.len(), self.error_policy)?;
        Ok(ExecOutcome::Completed(results))
    }

    /// Sends one command outside any transaction.
    pub async fn custom_command<I, A>(
        &self,
        parts: I,
        route: Route,
    ) -> Result<ClusterValue<Value>, ExecError>
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        let cmd = Cmd::custom(parts).ok_or(BuildError::EmptyCommand)?;
        let snapshot = self.topology.snapshot();
        let targets = route.resolve(&snapshot, cmd.first_key())?;
        debug!(
            command = cmd.name(),
            ?route,
            fan_out = route.is_fan_out(),
            ?targets,
            "sending command"
        );

        let replies = self.transport.send(&cmd, &targets).await?;
        Ok(reconcile_command(&targets, replies)?)
    }

    pub async fn get(&self, key: impl Into<Vec<u8>>) -> Result<Value, ExecError> {
        self.send_single(Cmd::new("GET").key(key)).await
    }

    pub async fn set(
        &self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Result<Value, ExecError> {
        self.send_single(Cmd::new("SET").key(key).arg(value)).await
    }

    /// Watches `keys` on the node owning the first of them.
    ///
    /// The WATCH lands on the same node a later `exec` of a transaction
    /// touching these keys is routed to.
    ///
    /// All callers of one client share a single connection per node, and
    /// with it the node's watch state. Any `EXEC` or `UNWATCH` reaching that
    /// node in between, from whichever task, clears the watch, and the
    /// transaction that relied on it then completes instead of aborting.
    /// Use a separate client per optimistic-locking caller when
    /// transactions run concurrently.
    pub async fn watch<I, K>(&self, keys: I) -> Result<Value, ExecError>
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        let cmd = keys.into_iter().fold(Cmd::new("WATCH"), |cmd, key| cmd.key(key));
        if cmd.args().is_empty() {
            return Err(BuildError::MissingArguments {
                command: "WATCH",
                what: "key",
            }
            .into());
        }
        self.send_single(cmd).await
    }

    /// Drops every watch held on the nodes selected by `route`.
    pub async fn unwatch(&self, route: Route) -> Result<ClusterValue<Value>, ExecError> {
        self.custom_command(["UNWATCH"], route).await
    }

    fn prepare(
        &self,
        transaction: Transaction,
        route: &Route,
    ) -> Result<(Vec<Cmd>, Vec<NodeAddr>), ExecError> {
        let key_hint = transaction.first_key().map(<[u8]>::to_vec);
        let commands = transaction.into_commands()?;
        let snapshot = self.topology.snapshot();
        let targets = route.resolve(&snapshot, key_hint.as_deref())?;
        debug!(
            commands = commands.len(),
            ?route,
            fan_out = route.is_fan_out(),
            ?targets,
            "executing transaction"
        );
        Ok((commands, targets))
    }

    /// One round-trip; `None` means the transaction was aborted.
    async fn submit(
        &self,
        commands: &[Cmd],
        targets: &[NodeAddr],
    ) -> Result<Option<HashMap<NodeAddr, Value>>, ExecError> {
        let completion = self.transport.submit(commands, targets).await?;
        match inspect(completion) {
            Inspection::Aborted { node } => {
                debug!(?node, "transaction aborted: watched key changed");
                Ok(None)
            }
            Inspection::Proceed(replies) => Ok(Some(replies)),
        }
    }

    async fn send_single(&self, cmd: Cmd) -> Result<Value, ExecError> {
        let snapshot = self.topology.snapshot();
        let targets = Route::Default.resolve(&snapshot, cmd.first_key())?;
        let target = targets.first().ok_or(RoutingError::NoNodes)?;

        let mut replies = self
            .transport
            .send(&cmd, slice::from_ref(target))
            .await?;
        replies
            .remove(target)
            .ok_or_else(|| ReplyError::MissingReply { node: target.clone() }.into())
    }
}
