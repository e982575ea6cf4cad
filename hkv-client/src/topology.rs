//! # Topology Snapshots
//!
//! Purpose: Hold an immutable picture of which primary owns which slot
//! range, and which replicas follow it. Discovery and refresh happen
//! elsewhere; this module only validates and answers lookups.
//!
//! ## Design Principles
//! 1. **Immutable Snapshots**: A snapshot is shared behind `Arc` and never
//!    changes; a refresh swaps in a new one.
//! 2. **Sorted Ranges**: Slot lookups are a binary search over ranges.
//! 3. **Deterministic Enumeration**: Node lists are sorted by address, so
//!    fan-out results come back in the same order every time.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use hkv_common::{NodeAddr, SLOT_COUNT};

/// Invalid topology description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("topology has no slot ranges")]
    Empty,
    #[error("slot range {start}-{end} is invalid")]
    InvalidRange { start: u16, end: u16 },
    #[error("slot {slot} is assigned to more than one range")]
    Overlap { slot: u16 },
}

/// Inclusive slot range served by one primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub primary: NodeAddr,
    pub replicas: Vec<NodeAddr>,
}

impl SlotRange {
    pub fn new(start: u16, end: u16, primary: impl Into<NodeAddr>) -> Self {
        SlotRange {
            start,
            end,
            primary: primary.into(),
            replicas: Vec::new(),
        }
    }

    pub fn with_replicas<I, A>(mut self, replicas: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<NodeAddr>,
    {
        self.replicas = replicas.into_iter().map(Into::into).collect();
        self
    }

    pub fn contains(&self, slot: u16) -> bool {
        self.start <= slot && slot <= self.end
    }
}

/// Validated, read-only view of the cluster layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologySnapshot {
    // Sorted by `start`, non-overlapping.
    ranges: Vec<SlotRange>,
    primaries: Vec<NodeAddr>,
    nodes: Vec<NodeAddr>,
}

impl TopologySnapshot {
    /// Builds a snapshot from slot ranges in any order.
    ///
    /// Gaps are allowed (slots in a gap are simply unroutable); overlaps and
    /// ranges outside `0..SLOT_COUNT` are not.
    pub fn new(mut ranges: Vec<SlotRange>) -> Result<Self, TopologyError> {
        if ranges.is_empty() {
            return Err(TopologyError::Empty);
        }
        ranges.sort_by_key(|range| range.start);

        let mut prev_end: Option<u16> = None;
        for range in &ranges {
            if range.start > range.end || range.end >= SLOT_COUNT {
                return Err(TopologyError::InvalidRange {
                    start: range.start,
                    end: range.end,
                });
            }
            if let Some(end) = prev_end {
                if range.start <= end {
                    return Err(TopologyError::Overlap { slot: range.start });
                }
            }
            prev_end = Some(range.end);
        }

        let mut primaries: Vec<NodeAddr> = ranges.iter().map(|r| r.primary.clone()).collect();
        primaries.sort();
        primaries.dedup();

        let mut nodes = primaries.clone();
        nodes.extend(ranges.iter().flat_map(|r| r.replicas.iter().cloned()));
        nodes.sort();
        nodes.dedup();

        Ok(TopologySnapshot {
            ranges,
            primaries,
            nodes,
        })
    }

    /// A standalone server: one primary owning every slot.
    pub fn single(addr: impl Into<NodeAddr>) -> Self {
        let addr = addr.into();
        TopologySnapshot {
            ranges: vec![SlotRange::new(0, SLOT_COUNT - 1, addr.clone())],
            primaries: vec![addr.clone()],
            nodes: vec![addr],
        }
    }

    pub fn ranges(&self) -> &[SlotRange] {
        &self.ranges
    }

    /// Primaries in ascending address order.
    pub fn primaries(&self) -> &[NodeAddr] {
        &self.primaries
    }

    /// Primaries and replicas in ascending address order.
    pub fn nodes(&self) -> &[NodeAddr] {
        &self.nodes
    }

    /// Primary owning `slot`, if the slot is covered.
    pub fn primary_for_slot(&self, slot: u16) -> Option<&NodeAddr> {
        let idx = self.ranges.partition_point(|range| range.end < slot);
        self.ranges
            .get(idx)
            .filter(|range| range.contains(slot))
            .map(|range| &range.primary)
    }
}

/// Source of the freshest known topology.
///
/// Implementations refresh on their own schedule; callers read one snapshot
/// per request and use it for the whole request.
pub trait TopologyProvider: Send + Sync {
    fn snapshot(&self) -> Arc<TopologySnapshot>;
}

impl<P: TopologyProvider + ?Sized> TopologyProvider for Arc<P> {
    fn snapshot(&self) -> Arc<TopologySnapshot> {
        (**self).snapshot()
    }
}

/// Topology supplied by the application, replaceable at runtime.
pub struct StaticTopology {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl StaticTopology {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        StaticTopology {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Standalone server at `addr`.
    pub fn single(addr: impl Into<NodeAddr>) -> Self {
        Self::new(TopologySnapshot::single(addr))
    }

    /// Swaps in a fresher snapshot; requests already in flight keep theirs.
    pub fn replace(&self, snapshot: TopologySnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}

impl TopologyProvider for StaticTopology {
    fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_shards() -> TopologySnapshot {
        TopologySnapshot::new(vec![
            SlotRange::new(10923, 16383, "10.0.0.3:6379").with_replicas(["10.0.0.6:6379"]),
            SlotRange::new(0, 5460, "10.0.0.1:6379").with_replicas(["10.0.0.4:6379"]),
            SlotRange::new(5461, 10922, "10.0.0.2:6379"),
        ])
        .unwrap()
    }

    #[test]
    fn looks_up_slot_owner() {
        let topo = three_shards();
        assert_eq!(topo.primary_for_slot(0).unwrap().as_str(), "10.0.0.1:6379");
        assert_eq!(topo.primary_for_slot(5461).unwrap().as_str(), "10.0.0.2:6379");
        assert_eq!(topo.primary_for_slot(16383).unwrap().as_str(), "10.0.0.3:6379");
    }

    #[test]
    fn enumerates_nodes_sorted() {
        let topo = three_shards();
        let primaries: Vec<&str> = topo.primaries().iter().map(NodeAddr::as_str).collect();
        assert_eq!(primaries, ["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"]);
        assert_eq!(topo.nodes().len(), 5);
        assert_eq!(topo.nodes()[3].as_str(), "10.0.0.4:6379");
    }

    #[test]
    fn gaps_are_unroutable() {
        let topo = TopologySnapshot::new(vec![SlotRange::new(0, 99, "a:1")]).unwrap();
        assert!(topo.primary_for_slot(100).is_none());
    }

    #[test]
    fn rejects_bad_ranges() {
        assert_eq!(TopologySnapshot::new(Vec::new()), Err(TopologyError::Empty));
        assert_eq!(
            TopologySnapshot::new(vec![SlotRange::new(0, 16384, "a:1")]),
            Err(TopologyError::InvalidRange { start: 0, end: 16384 })
        );
        assert_eq!(
            TopologySnapshot::new(vec![SlotRange::new(0, 100, "a:1"), SlotRange::new(100, 200, "b:1")]),
            Err(TopologyError::Overlap { slot: 100 })
        );
    }

    #[test]
    fn replace_swaps_snapshot() {
        let provider = StaticTopology::single("a:1");
        let before = provider.snapshot();
        provider.replace(three_shards());
        assert_eq!(before.primaries().len(), 1);
        assert_eq!(provider.snapshot().primaries().len(), 3);
    }
}
