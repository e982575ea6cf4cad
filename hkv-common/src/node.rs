//! # Node Identity
//!
//! A cluster node is identified by the address clients dial, e.g.
//! `"10.0.0.7:6379"`. The address is kept verbatim; ordering is plain string
//! ordering so every component enumerates nodes the same way.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a single cluster node (`host:port`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddr(String);

impl NodeAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        NodeAddr(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddr {
    fn from(addr: &str) -> Self {
        NodeAddr::new(addr)
    }
}

impl From<String> for NodeAddr {
    fn from(addr: String) -> Self {
        NodeAddr(addr)
    }
}
