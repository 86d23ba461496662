//! Standalone structural validation of a persisted graph document.
//!
//! The validator separates structural violations (errors) from tolerable
//! inconsistencies (warnings) and never halts on the first finding.

use std::fmt;

use hashbrown::{HashMap, HashSet};

use crate::model::RoadGraph;
use crate::{LaneId, NodeId};

const SPLIT_RATIO_TOLERANCE: f64 = 0.01;

/// A single validation finding.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    DuplicateLane(LaneId),
    DuplicateNode(NodeId),
    /// A lane's node list references an undeclared node.
    DanglingLaneNode { lane_id: LaneId, node_id: NodeId },
    /// A node is listed by more than one lane.
    SharedNode { node_id: NodeId },
    /// A node's owning lane does not exist.
    UnknownLane { node_id: NodeId, lane_id: LaneId },
    /// A connection points to an undeclared node.
    DanglingConnection { node_id: NodeId, target: NodeId },
    /// A target appears in more than one of direct/near/crossing.
    OverlappingEdgeSets { node_id: NodeId, target: NodeId },
    /// The declared stop-line node is not part of the lane.
    DanglingStopline { lane_id: LaneId, node_id: NodeId },
    /// Segment length must be positive to derive a node count.
    BadSegmentLength { lane_id: LaneId },
    /// Node count differs from `ceil(total_length / segment_length)`.
    NodeCountMismatch {
        lane_id: LaneId,
        expected: usize,
        actual: usize,
    },
    /// Fan-out split ratios do not sum to 1.0 within tolerance.
    SplitRatioSum { lane_id: LaneId, sum: f64 },
    /// A fan-out entry targets an unknown lane.
    DanglingFanOut { lane_id: LaneId, target: LaneId },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DuplicateLane(lane_id) => write!(f, "duplicate lane id {lane_id}"),
            Finding::DuplicateNode(node_id) => write!(f, "duplicate node id {node_id}"),
            Finding::DanglingLaneNode { lane_id, node_id } => {
                write!(f, "lane {lane_id} lists undeclared node {node_id}")
            }
            Finding::SharedNode { node_id } => {
                write!(f, "node {node_id} is listed by more than one lane")
            }
            Finding::UnknownLane { node_id, lane_id } => {
                write!(f, "node {node_id} belongs to unknown lane {lane_id}")
            }
            Finding::DanglingConnection { node_id, target } => {
                write!(f, "node {node_id} connects to nonexistent node {target}")
            }
            Finding::OverlappingEdgeSets { node_id, target } => write!(
                f,
                "node {node_id} lists {target} in more than one edge set"
            ),
            Finding::DanglingStopline { lane_id, node_id } => {
                write!(f, "lane {lane_id} declares stop-line node {node_id} outside its node list")
            }
            Finding::BadSegmentLength { lane_id } => {
                write!(f, "lane {lane_id} has a non-positive segment length")
            }
            Finding::NodeCountMismatch {
                lane_id,
                expected,
                actual,
            } => write!(
                f,
                "lane {lane_id} declares {actual} nodes, expected {expected}"
            ),
            Finding::SplitRatioSum { lane_id, sum } => {
                write!(f, "lane {lane_id} fan-out ratios sum to {sum:.3}, expected 1.0")
            }
            Finding::DanglingFanOut { lane_id, target } => {
                write!(f, "lane {lane_id} fans out to unknown lane {target}")
            }
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )
    }
}

/// Re-check the invariants of a persisted graph document.
pub fn validate(graph: &RoadGraph) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut lane_ids: HashSet<LaneId> = HashSet::new();
    for lane in &graph.lanes {
        if !lane_ids.insert(lane.lane_id) {
            report.errors.push(Finding::DuplicateLane(lane.lane_id));
        }
    }

    let mut node_ids: HashSet<NodeId> = HashSet::new();
    for node in &graph.nodes {
        if !node_ids.insert(node.node_id) {
            report.errors.push(Finding::DuplicateNode(node.node_id));
        }
    }

    // Lane-side checks: membership, counts, stop lines, fan-out.
    let mut owner_count: HashMap<NodeId, usize> = HashMap::new();
    for lane in &graph.lanes {
        for &node_id in &lane.nodes {
            if !node_ids.contains(&node_id) {
                report.errors.push(Finding::DanglingLaneNode {
                    lane_id: lane.lane_id,
                    node_id,
                });
            }
            *owner_count.entry(node_id).or_insert(0) += 1;
        }

        if let Some(stopline) = lane.stopline_node
            && !lane.nodes.contains(&stopline)
        {
            report.errors.push(Finding::DanglingStopline {
                lane_id: lane.lane_id,
                node_id: stopline,
            });
        }

        if lane.segment_length <= 0.0 {
            report
                .errors
                .push(Finding::BadSegmentLength { lane_id: lane.lane_id });
        } else {
            let expected = (lane.total_length / lane.segment_length).ceil() as usize;
            if expected != lane.nodes.len() {
                report.warnings.push(Finding::NodeCountMismatch {
                    lane_id: lane.lane_id,
                    expected,
                    actual: lane.nodes.len(),
                });
            }
        }

        if !lane.downstream_connections.is_empty() {
            let sum: f64 = lane
                .downstream_connections
                .iter()
                .map(|conn| conn.split_ratio)
                .sum();
            if (sum - 1.0).abs() > SPLIT_RATIO_TOLERANCE {
                report.warnings.push(Finding::SplitRatioSum {
                    lane_id: lane.lane_id,
                    sum,
                });
            }
            for conn in &lane.downstream_connections {
                if !lane_ids.contains(&conn.target_lane) {
                    report.errors.push(Finding::DanglingFanOut {
                        lane_id: lane.lane_id,
                        target: conn.target_lane,
                    });
                }
            }
        }
    }

    for (&node_id, &owners) in owner_count.iter() {
        if owners > 1 {
            report.errors.push(Finding::SharedNode { node_id });
        }
    }

    // Node-side checks: lane membership, connection targets, disjointness.
    for node in &graph.nodes {
        if !lane_ids.contains(&node.lane_id) {
            report.errors.push(Finding::UnknownLane {
                node_id: node.node_id,
                lane_id: node.lane_id,
            });
        }

        let connections = &node.node_connections;
        for (_, target) in connections.iter() {
            if !node_ids.contains(&target) {
                report.errors.push(Finding::DanglingConnection {
                    node_id: node.node_id,
                    target,
                });
            }
        }

        let mut seen: HashSet<NodeId> = HashSet::new();
        for (_, target) in connections.iter() {
            if !seen.insert(target) {
                report.errors.push(Finding::OverlappingEdgeSets {
                    node_id: node.node_id,
                    target,
                });
            }
        }
    }

    report
}
