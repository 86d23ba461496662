use geo::Point;
use serde::{Deserialize, Serialize};

use crate::{LaneId, NodeId};

/// One row of the lane geometry table used during graph construction.
///
/// Coordinates are expected in a projected (metric) system; distance
/// thresholds are meaningless in geographic degrees.
#[derive(Debug, Clone)]
pub struct LaneFeature {
    pub lane_id: LaneId,
    /// Groups lanes belonging to the same physical road. Lanes without one
    /// form singleton groups and receive no sequential links.
    pub join_fid: Option<String>,
    /// Centroid of the lane polygon.
    pub centroid: Point<f64>,
    /// Total drivable length in meters.
    pub total_length: f64,
    /// The lane ends at a stop line; its last node becomes the control node.
    pub stopline: bool,
}

/// Persisted lane record of the graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub lane_id: LaneId,
    /// Node ids in driving order from the lane start.
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub stopline_node: Option<NodeId>,
    pub segment_length: f64,
    pub total_length: f64,
    /// Fan-out to downstream lanes; split ratios must sum to 1.0.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downstream_connections: Vec<LaneConnection>,
}

/// One entry of a lane's downstream fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConnection {
    pub target_lane: LaneId,
    pub split_ratio: f64,
}
