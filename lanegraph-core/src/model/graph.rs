use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hashbrown::HashMap;
use log::info;
use petgraph::prelude::DiGraphMap;
use serde::{Deserialize, Serialize};

use super::{EdgeKind, Lane, Node};
use crate::{Error, NodeId};

/// The persisted road-network document: lanes plus their fixed-length nodes.
///
/// Built once per run and frozen afterwards; aggregation and every other
/// consumer treat it as read-only. Serialization round-trips without loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadGraph {
    pub lanes: Vec<Lane>,
    pub nodes: Vec<Node>,
}

impl RoadGraph {
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to open graph file '{}': {}", path.display(), e),
            )
        })?;
        let graph: RoadGraph = serde_json::from_reader(BufReader::new(file))?;
        info!(
            "Loaded graph document: {} lanes, {} nodes",
            graph.lanes.len(),
            graph.nodes.len()
        );
        Ok(graph)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!(
            "Wrote graph document '{}': {} lanes, {} nodes",
            path.display(),
            self.lanes.len(),
            self.nodes.len()
        );
        Ok(())
    }

    /// Position of each node record, keyed by id.
    pub fn node_index(&self) -> HashMap<NodeId, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.node_id, idx))
            .collect()
    }

    /// Directed connectivity view over the node edge sets. Edge weights carry
    /// the connection kind; parallel edges of different kinds cannot occur
    /// because the per-node sets are disjoint.
    pub fn connectivity(&self) -> DiGraphMap<NodeId, EdgeKind> {
        let mut graph = DiGraphMap::new();
        for node in &self.nodes {
            graph.add_node(node.node_id);
        }
        for node in &self.nodes {
            for (kind, target) in node.node_connections.iter() {
                graph.add_edge(node.node_id, target, kind);
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeConnections;

    fn sample_graph() -> RoadGraph {
        RoadGraph {
            lanes: vec![Lane {
                lane_id: 1,
                nodes: vec![0, 1],
                stopline_node: Some(1),
                segment_length: 10.0,
                total_length: 20.0,
                downstream_connections: vec![],
            }],
            nodes: vec![
                Node {
                    node_id: 0,
                    lane_id: 1,
                    position_in_lane: Some(0.0),
                    segment_length: 10.0,
                    node_connections: NodeConnections {
                        direct: vec![1],
                        near: vec![],
                        crossing: vec![],
                    },
                },
                Node {
                    node_id: 1,
                    lane_id: 1,
                    position_in_lane: None,
                    segment_length: 10.0,
                    node_connections: NodeConnections::default(),
                },
            ],
        }
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let graph = sample_graph();
        let json = serde_json::to_string(&graph).unwrap();
        let restored: RoadGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, restored);
    }

    #[test]
    fn empty_edge_sets_are_omitted_from_json() {
        let graph = sample_graph();
        let json = serde_json::to_string(&graph).unwrap();
        assert!(!json.contains("crossing"));
        assert!(json.contains("\"direct\":[1]"));
    }

    #[test]
    fn connectivity_exposes_direct_edges() {
        let graph = sample_graph();
        let view = graph.connectivity();
        assert_eq!(view.edge_weight(0, 1), Some(&EdgeKind::Direct));
        assert_eq!(view.edge_weight(1, 0), None);
    }
}
