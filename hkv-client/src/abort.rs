//! # Abort Detection
//!
//! Purpose: Recognize the "optimistic lock failed" outcome of `EXEC`. When a
//! watched key changes before the transaction runs, the node replies with a
//! null array instead of results, and none of the queued commands ran.
//!
//! Abort is all-or-nothing: one aborting node makes the whole submission
//! `Aborted`, whatever the other nodes returned.

use std::collections::HashMap;

use hkv_common::{NodeAddr, Value};

use crate::transport::Completion;

/// Verdict on a raw completion.
#[derive(Debug, PartialEq, Eq)]
pub enum Inspection {
    /// The transaction was dropped; `node` is the first node (in address
    /// order) that reported it, when the transport did not say so itself.
    Aborted { node: Option<NodeAddr> },
    /// No abort marker; the replies go on to reconciliation.
    Proceed(HashMap<NodeAddr, Value>),
}

/// Splits a completion into "aborted" or "replies to reconcile".
pub fn inspect(completion: Completion) -> Inspection {
    let replies = match completion {
        Completion::Aborted => return Inspection::Aborted { node: None },
        Completion::Replies(replies) => replies,
    };

    let aborted = replies
        .iter()
        .filter(|(_, reply)| is_abort_marker(reply))
        .map(|(node, _)| node)
        .min()
        .cloned();

    match aborted {
        Some(node) => Inspection::Aborted { node: Some(node) },
        None => Inspection::Proceed(replies),
    }
}

/// `EXEC` answers a WATCH conflict with a null reply.
pub fn is_abort_marker(reply: &Value) -> bool {
    reply.is_nil()
}
