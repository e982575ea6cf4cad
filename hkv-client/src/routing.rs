//! # Routing Policies
//!
//! Purpose: Turn a `Route` plus a topology snapshot into the concrete list of
//! nodes that will receive a request.
//!
//! ## Design Principles
//! 1. **Closed Set**: `Route` is an enum; every strategy is handled in one match.
//! 2. **Resolve Once**: A request resolves its route exactly once, right
//!    before dispatch, against a single snapshot.
//! 3. **Stable Fan-Out**: Multi-node routes enumerate nodes in snapshot
//!    order (ascending address), never in arrival order.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use hkv_common::{key_slot, NodeAddr, SLOT_COUNT};

use crate::topology::TopologySnapshot;

/// Which node(s) a request is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    /// Primary owning the first key of the request, or a random primary
    /// when the request has no key.
    #[default]
    Default,
    /// Any single primary.
    Random,
    /// Every primary and replica.
    AllNodes,
    /// Every primary.
    AllPrimaries,
    /// Primary owning the given slot.
    SlotId(u16),
    /// Primary owning the slot of the given key.
    SlotKey(Vec<u8>),
}

impl Route {
    /// True when the route can address more than one node.
    pub fn is_fan_out(&self) -> bool {
        matches!(self, Route::AllNodes | Route::AllPrimaries)
    }

    /// Resolves the route with the thread-local RNG.
    pub fn resolve(
        &self,
        topology: &TopologySnapshot,
        key_hint: Option<&[u8]>,
    ) -> Result<Vec<NodeAddr>, RoutingError> {
        self.resolve_with(topology, key_hint, &mut rand::thread_rng())
    }

    /// Resolves the route, drawing any random choice from `rng`.
    pub fn resolve_with<R: Rng + ?Sized>(
        &self,
        topology: &TopologySnapshot,
        key_hint: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Vec<NodeAddr>, RoutingError> {
        let targets = match self {
            Route::Default => match key_hint {
                Some(key) => vec![slot_owner(topology, key_slot(key))?],
                None => vec![random_primary(topology, rng)?],
            },
            Route::Random => vec![random_primary(topology, rng)?],
            Route::AllNodes => topology.nodes().to_vec(),
            Route::AllPrimaries => topology.primaries().to_vec(),
            Route::SlotId(slot) => {
                if *slot >= SLOT_COUNT {
                    return Err(RoutingError::InvalidSlot(*slot));
                }
                vec![slot_owner(topology, *slot)?]
            }
            Route::SlotKey(key) => vec![slot_owner(topology, key_slot(key))?],
        };

        if targets.is_empty() {
            return Err(RoutingError::NoNodes);
        }
        Ok(targets)
    }
}

/// Route could not be mapped onto the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("slot {0} is outside the cluster slot space")]
    InvalidSlot(u16),
    #[error("slot {0} is not served by any known primary")]
    SlotNotCovered(u16),
    #[error("topology contains no nodes")]
    NoNodes,
}

fn slot_owner(topology: &TopologySnapshot, slot: u16) -> Result<NodeAddr, RoutingError> {
    topology
        .primary_for_slot(slot)
        .cloned()
        .ok_or(RoutingError::SlotNotCovered(slot))
}

fn random_primary<R: Rng + ?Sized>(
    topology: &TopologySnapshot,
    rng: &mut R,
) -> Result<NodeAddr, RoutingError> {
    topology
        .primaries()
        .choose(rng)
        .cloned()
        .ok_or(RoutingError::NoNodes)
}
