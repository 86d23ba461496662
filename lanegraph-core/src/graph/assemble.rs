//! Final document assembly and merging of node-level evidence.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::{info, warn};

use super::classify::ClassifiedConnections;
use super::validate;
use crate::model::{EdgeKind, Lane, Node, RoadGraph};
use crate::{Error, NodeId};

/// Merge lanes and nodes into one document.
///
/// The document is validated before it is returned; structural errors abort
/// the run so no invalid graph is ever persisted. Warnings are logged and
/// tolerated.
pub fn assemble(lanes: Vec<Lane>, nodes: Vec<Node>) -> Result<RoadGraph, Error> {
    let graph = RoadGraph { lanes, nodes };
    let report = validate::validate(&graph);
    for warning in &report.warnings {
        warn!("graph warning: {warning}");
    }
    if report.has_errors() {
        for error in &report.errors {
            warn!("graph error: {error}");
        }
        return Err(Error::ValidationFailed(report));
    }
    info!(
        "Assembled graph: {} lanes, {} nodes",
        graph.lanes.len(),
        graph.nodes.len()
    );
    Ok(graph)
}

/// Counters from merging classified node-level evidence into a graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    pub direct_added: usize,
    pub near_added: usize,
    /// Evidence naming node ids absent from the graph; upstream data-quality
    /// noise, counted and skipped rather than silently dropped.
    pub unmatched: usize,
}

/// Merge classified node-level transition evidence into an expanded graph.
///
/// Classified edges are added on top of the expansion edges; the per-node
/// disjointness priority (direct over near) is preserved, so evidence that
/// duplicates an existing connection is a no-op.
pub fn merge_classified(
    graph: &mut RoadGraph,
    classified: &HashMap<u64, ClassifiedConnections>,
) -> MergeStats {
    let slot = graph.node_index();
    let known: HashSet<NodeId> = slot.keys().copied().collect();

    let mut stats = MergeStats::default();
    for &from in classified.keys().sorted() {
        let classes = &classified[&from];
        let Some(&from_slot) = slot.get(&from) else {
            stats.unmatched += classes.direct.len() + classes.near.len();
            continue;
        };

        for &to in &classes.direct {
            if !known.contains(&to) {
                stats.unmatched += 1;
                continue;
            }
            if graph.nodes[from_slot]
                .node_connections
                .insert(EdgeKind::Direct, to)
            {
                stats.direct_added += 1;
            }
        }
        for &to in &classes.near {
            if !known.contains(&to) {
                stats.unmatched += 1;
                continue;
            }
            if graph.nodes[from_slot]
                .node_connections
                .insert(EdgeKind::Near, to)
            {
                stats.near_added += 1;
            }
        }
    }

    if stats.unmatched > 0 {
        warn!(
            "{} classified transitions referenced node ids absent from the graph",
            stats.unmatched
        );
    }
    info!(
        "Merged node-level evidence: {} direct, {} near added",
        stats.direct_added, stats.near_added
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeConnections;

    fn lane(lane_id: u64, nodes: Vec<NodeId>) -> Lane {
        Lane {
            lane_id,
            total_length: nodes.len() as f64 * 10.0,
            nodes,
            stopline_node: None,
            segment_length: 10.0,
            downstream_connections: vec![],
        }
    }

    fn node(node_id: NodeId, lane_id: u64) -> Node {
        Node {
            node_id,
            lane_id,
            position_in_lane: Some(0.0),
            segment_length: 10.0,
            node_connections: NodeConnections::default(),
        }
    }

    #[test]
    fn assemble_refuses_structural_errors() {
        let mut bad = node(0, 1);
        bad.node_connections.direct.push(42); // nonexistent target
        let result = assemble(vec![lane(1, vec![0])], vec![bad]);
        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn assemble_accepts_a_well_built_graph() {
        let graph = assemble(vec![lane(1, vec![0])], vec![node(0, 1)]).unwrap();
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn merge_adds_classified_edges_and_counts_unmatched() {
        let mut graph = RoadGraph {
            lanes: vec![lane(1, vec![0, 1])],
            nodes: vec![node(0, 1), node(1, 1)],
        };
        let mut classified = HashMap::new();
        classified.insert(
            0,
            ClassifiedConnections {
                direct: vec![1],
                near: vec![99], // unknown
            },
        );
        classified.insert(
            7, // unknown origin
            ClassifiedConnections {
                direct: vec![1],
                near: vec![],
            },
        );

        let stats = merge_classified(&mut graph, &classified);
        assert_eq!(stats.direct_added, 1);
        assert_eq!(stats.near_added, 0);
        assert_eq!(stats.unmatched, 2);
        assert_eq!(graph.nodes[0].node_connections.direct, vec![1]);
    }

    #[test]
    fn merge_never_duplicates_an_existing_connection() {
        let mut graph = RoadGraph {
            lanes: vec![lane(1, vec![0, 1])],
            nodes: vec![node(0, 1), node(1, 1)],
        };
        graph.nodes[0].node_connections.direct.push(1);

        let mut classified = HashMap::new();
        classified.insert(
            0,
            ClassifiedConnections {
                direct: vec![1],
                near: vec![1],
            },
        );
        let stats = merge_classified(&mut graph, &classified);
        assert_eq!(stats.direct_added, 0);
        assert_eq!(stats.near_added, 0);
        assert_eq!(graph.nodes[0].node_connections.direct, vec![1]);
        assert!(graph.nodes[0].node_connections.near.is_empty());
    }
}
