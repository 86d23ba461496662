use serde::{Deserialize, Serialize};

use crate::{LaneId, NodeId};

/// Kind of a directed connection between two segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Primary sequential successor.
    Direct,
    /// Secondary or laterally adjacent connection.
    Near,
    /// Long-range jump inferred purely from trajectory evidence.
    Crossing,
}

/// The three directed edge sets of a node. The sets are pairwise disjoint;
/// [`NodeConnections::insert`] keeps them that way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConnections {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub direct: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub near: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crossing: Vec<NodeId>,
}

impl NodeConnections {
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.near.is_empty() && self.crossing.is_empty()
    }

    /// True if `target` is present in any of the three sets.
    pub fn contains(&self, target: NodeId) -> bool {
        self.direct.contains(&target)
            || self.near.contains(&target)
            || self.crossing.contains(&target)
    }

    /// Add a directed edge unless the target is already connected under any
    /// kind. Returns whether the edge was added, so callers can insert in
    /// priority order (direct before near before crossing).
    pub fn insert(&mut self, kind: EdgeKind, target: NodeId) -> bool {
        if self.contains(target) {
            return false;
        }
        match kind {
            EdgeKind::Direct => self.direct.push(target),
            EdgeKind::Near => self.near.push(target),
            EdgeKind::Crossing => self.crossing.push(target),
        }
        true
    }

    /// All outgoing edges with their kind.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeKind, NodeId)> + '_ {
        let direct = self.direct.iter().map(|&n| (EdgeKind::Direct, n));
        let near = self.near.iter().map(|&n| (EdgeKind::Near, n));
        let crossing = self.crossing.iter().map(|&n| (EdgeKind::Crossing, n));
        direct.chain(near).chain(crossing)
    }
}

/// Persisted node record: one fixed-length subdivision of a lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub lane_id: LaneId,
    /// Offset from the lane start in meters; `None` for the stop-line node,
    /// which is a control point rather than a metric offset.
    #[serde(default)]
    pub position_in_lane: Option<f64>,
    pub segment_length: f64,
    #[serde(default)]
    pub node_connections: NodeConnections,
}
