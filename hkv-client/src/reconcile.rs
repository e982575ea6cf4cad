//! # Result Reconciliation
//!
//! Purpose: Turn per-node `EXEC` replies into one result per command, in
//! transaction order, tagged as either a single value or one value per node.
//!
//! ## Design Principles
//! 1. **Shape From Routing**: `Single` vs `Multi` is decided by how many
//!    nodes were addressed, never by what the payload looks like.
//! 2. **Order Preservation**: Output index `i` is command `i`; within a
//!    `Multi`, nodes follow the resolved target order.
//! 3. **Pure**: Same replies in, same results out.
//!
//! ## Shape Example
//!
//! ```text
//! targets = [a, b], commands = [INFO, DBSIZE]
//!
//! replies                        results
//! a -> [info_a, 10]       =>     [Multi([(a, info_a), (b, info_b)]),
//! b -> [info_b, 12]               Multi([(a, 10),     (b, 12)])]
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hkv_common::{NodeAddr, ServerError, Value};

/// Outcome of one command inside a completed transaction.
pub type CommandResult = Result<Value, ServerError>;

/// How a per-command error reply is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep the reply as `Ok(Value::Error(..))`.
    #[default]
    Inline,
    /// Move the reply to `Err(ServerError)`.
    Separate,
}

impl ErrorPolicy {
    pub fn apply(self, value: Value) -> CommandResult {
        match (self, value) {
            (ErrorPolicy::Separate, Value::Error(err)) => Err(err),
            (_, value) => Ok(value),
        }
    }
}

/// Value produced by one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeValue<T> {
    pub node: NodeAddr,
    pub value: T,
}

/// Result of a request that addressed one node or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterValue<T> {
    Single(T),
    Multi(Vec<NodeValue<T>>),
}

impl<T> ClusterValue<T> {
    pub fn is_single(&self) -> bool {
        matches!(self, ClusterValue::Single(_))
    }

    pub fn single(&self) -> Option<&T> {
        match self {
            ClusterValue::Single(value) => Some(value),
            ClusterValue::Multi(_) => None,
        }
    }

    pub fn multi(&self) -> Option<&[NodeValue<T>]> {
        match self {
            ClusterValue::Single(_) => None,
            ClusterValue::Multi(values) => Some(values),
        }
    }

    pub fn into_single(self) -> Option<T> {
        match self {
            ClusterValue::Single(value) => Some(value),
            ClusterValue::Multi(_) => None,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> ClusterValue<U> {
        match self {
            ClusterValue::Single(value) => ClusterValue::Single(f(value)),
            ClusterValue::Multi(values) => ClusterValue::Multi(
                values
                    .into_iter()
                    .map(|NodeValue { node, value }| NodeValue {
                        node,
                        value: f(value),
                    })
                    .collect(),
            ),
        }
    }
}

/// Reply payload does not fit the submitted request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("no reply from {node}")]
    MissingReply { node: NodeAddr },
    #[error("{node} returned {actual} results for {expected} commands")]
    LengthMismatch {
        node: NodeAddr,
        expected: usize,
        actual: usize,
    },
    /// The node refused the transaction as a whole, e.g. `EXECABORT`.
    #[error("{node} rejected the transaction: {error}")]
    Rejected { node: NodeAddr, error: ServerError },
    #[error("{node} sent an unexpected reply: {reply}")]
    Unexpected { node: NodeAddr, reply: Value },
}

/// Reconciles raw `EXEC` replies for a transaction of `expected` commands.
///
/// `targets` is the resolved target list; its order fixes the node order of
/// every `Multi` entry.
pub fn reconcile(
    targets: &[NodeAddr],
    mut replies: HashMap<NodeAddr, Value>,
    expected: usize,
    policy: ErrorPolicy,
) -> Result<Vec<ClusterValue<CommandResult>>, ReplyError> {
    let mut per_node = Vec::with_capacity(targets.len());
    for node in targets {
        let reply = replies
            .remove(node)
            .ok_or_else(|| ReplyError::MissingReply { node: node.clone() })?;
        per_node.push((node, exec_items(node, reply, expected)?));
    }

    if per_node.len() == 1 {
        if let Some((_, items)) = per_node.pop() {
            return Ok(items
                .into_iter()
                .map(|item| ClusterValue::Single(policy.apply(item)))
                .collect());
        }
    }

    let mut columns: Vec<Vec<NodeValue<CommandResult>>> = (0..expected)
        .map(|_| Vec::with_capacity(per_node.len()))
        .collect();
    for (node, items) in per_node {
        for (column, item) in columns.iter_mut().zip(items) {
            column.push(NodeValue {
                node: node.clone(),
                value: policy.apply(item),
            });
        }
    }
    Ok(columns.into_iter().map(ClusterValue::Multi).collect())
}

/// Reconciles the replies of a single-node request into a flat list.
pub fn reconcile_flat(
    target: &NodeAddr,
    mut replies: HashMap<NodeAddr, Value>,
    expected: usize,
    policy: ErrorPolicy,
) -> Result<Vec<CommandResult>, ReplyError> {
    let reply = replies
        .remove(target)
        .ok_or_else(|| ReplyError::MissingReply {
            node: target.clone(),
        })?;
    Ok(exec_items(target, reply, expected)?
        .into_iter()
        .map(|item| policy.apply(item))
        .collect())
}

/// Shapes the replies of a single non-transactional command.
pub fn reconcile_command(
    targets: &[NodeAddr],
    mut replies: HashMap<NodeAddr, Value>,
) -> Result<ClusterValue<Value>, ReplyError> {
    let mut values = Vec::with_capacity(targets.len());
    for node in targets {
        let value = replies
            .remove(node)
            .ok_or_else(|| ReplyError::MissingReply { node: node.clone() })?;
        values.push(NodeValue {
            node: node.clone(),
            value,
        });
    }

    if values.len() == 1 {
        if let Some(NodeValue { value, .. }) = values.pop() {
            return Ok(ClusterValue::Single(value));
        }
    }
    Ok(ClusterValue::Multi(values))
}

fn exec_items(node: &NodeAddr, reply: Value, expected: usize) -> Result<Vec<Value>, ReplyError> {
    match reply {
        Value::Array(items) if items.len() == expected => Ok(items),
        Value::Array(items) => Err(ReplyError::LengthMismatch {
            node: node.clone(),
            expected,
            actual: items.len(),
        }),
        Value::Error(error) => Err(ReplyError::Rejected {
            node: node.clone(),
            error,
        }),
        reply => Err(ReplyError::Unexpected {
            node: node.clone(),
            reply,
        }),
    }
}
