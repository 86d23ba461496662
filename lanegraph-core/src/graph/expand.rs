//! Subdivision of lanes into fixed-length nodes.

use hashbrown::HashMap;
use log::info;

use super::LaneLinks;
use crate::model::{EdgeKind, Lane, LaneFeature, Node, NodeConnections};
use crate::{LaneId, NodeId};

/// Expand each lane into `ceil(total_length / segment_length)` nodes with
/// globally sequential ids, wiring node-level connectivity from the resolved
/// lane links.
///
/// Intra-lane `direct` edges chain node i to node i+1. Lane-level `direct`
/// and `crossing` edges are inherited at the boundary (last node of the
/// origin to first node of the target); lane-level `near` edges become
/// index-aligned node pairs, truncated to the shorter lane. A lane flagged
/// `stopline` uses its last node as the control node, which carries no
/// `position_in_lane`.
pub fn expand_lanes(
    features: &[LaneFeature],
    links: &LaneLinks,
    segment_length: f64,
) -> (Vec<Lane>, Vec<Node>) {
    let mut lanes = Vec::with_capacity(features.len());
    let mut nodes: Vec<Node> = Vec::new();
    let mut next_id: NodeId = 0;

    for feature in features {
        let count = (feature.total_length / segment_length).ceil() as usize;
        let node_ids: Vec<NodeId> = (0..count as u64).map(|i| next_id + i).collect();
        next_id += count as u64;

        let stopline_node = if feature.stopline {
            node_ids.last().copied()
        } else {
            None
        };

        for (index, &node_id) in node_ids.iter().enumerate() {
            let is_stopline = stopline_node == Some(node_id);
            nodes.push(Node {
                node_id,
                lane_id: feature.lane_id,
                position_in_lane: (!is_stopline).then(|| index as f64 * segment_length),
                segment_length,
                node_connections: NodeConnections::default(),
            });
        }

        lanes.push(Lane {
            lane_id: feature.lane_id,
            nodes: node_ids,
            stopline_node,
            segment_length,
            total_length: feature.total_length,
            downstream_connections: vec![],
        });
    }

    let node_slot: HashMap<NodeId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.node_id, idx))
        .collect();
    let lane_nodes: HashMap<LaneId, Vec<NodeId>> = lanes
        .iter()
        .map(|lane| (lane.lane_id, lane.nodes.clone()))
        .collect();

    let connect = |from: NodeId, to: NodeId, kind: EdgeKind, nodes: &mut Vec<Node>| {
        nodes[node_slot[&from]].node_connections.insert(kind, to);
    };

    // Direct first so the disjointness priority holds, then near, then
    // crossing.
    for lane_ids in lanes.iter().map(|lane| &lane.nodes) {
        for pair in lane_ids.windows(2) {
            connect(pair[0], pair[1], EdgeKind::Direct, &mut nodes);
        }
    }
    for &(from_lane, to_lane) in &links.direct {
        if let (Some(from), Some(to)) = boundary_pair(&lane_nodes, from_lane, to_lane) {
            connect(from, to, EdgeKind::Direct, &mut nodes);
        }
    }
    for &(from_lane, to_lane) in &links.near {
        let (Some(from_ids), Some(to_ids)) =
            (lane_nodes.get(&from_lane), lane_nodes.get(&to_lane))
        else {
            continue;
        };
        for (&from, &to) in from_ids.iter().zip(to_ids) {
            connect(from, to, EdgeKind::Near, &mut nodes);
        }
    }
    for &(from_lane, to_lane) in &links.crossing {
        if let (Some(from), Some(to)) = boundary_pair(&lane_nodes, from_lane, to_lane) {
            connect(from, to, EdgeKind::Crossing, &mut nodes);
        }
    }

    info!(
        "Expanded {} lanes into {} nodes (segment length {segment_length} m)",
        lanes.len(),
        nodes.len()
    );
    (lanes, nodes)
}

/// Last node of the origin lane and first node of the target lane, if both
/// lanes have any.
fn boundary_pair(
    lane_nodes: &HashMap<LaneId, Vec<NodeId>>,
    from_lane: LaneId,
    to_lane: LaneId,
) -> (Option<NodeId>, Option<NodeId>) {
    (
        lane_nodes.get(&from_lane).and_then(|ids| ids.last().copied()),
        lane_nodes.get(&to_lane).and_then(|ids| ids.first().copied()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn feature(lane_id: LaneId, total_length: f64, stopline: bool) -> LaneFeature {
        LaneFeature {
            lane_id,
            join_fid: None,
            centroid: Point::new(0.0, 0.0),
            total_length,
            stopline,
        }
    }

    #[test]
    fn node_count_is_ceil_of_length_over_segment() {
        let features = vec![feature(1, 35.0, false), feature(2, 30.0, false)];
        let (lanes, nodes) = expand_lanes(&features, &LaneLinks::default(), 10.0);
        assert_eq!(lanes[0].nodes.len(), 4);
        assert_eq!(lanes[1].nodes.len(), 3);
        assert_eq!(nodes.len(), 7);
    }

    #[test]
    fn node_ids_are_globally_unique_and_sequential() {
        let features = vec![feature(1, 20.0, false), feature(2, 20.0, false)];
        let (lanes, _) = expand_lanes(&features, &LaneLinks::default(), 10.0);
        assert_eq!(lanes[0].nodes, vec![0, 1]);
        assert_eq!(lanes[1].nodes, vec![2, 3]);
    }

    #[test]
    fn intra_lane_nodes_chain_with_direct_edges() {
        let features = vec![feature(1, 30.0, false)];
        let (_, nodes) = expand_lanes(&features, &LaneLinks::default(), 10.0);
        assert_eq!(nodes[0].node_connections.direct, vec![1]);
        assert_eq!(nodes[1].node_connections.direct, vec![2]);
        assert!(nodes[2].node_connections.direct.is_empty());
    }

    #[test]
    fn positions_are_offsets_from_lane_start() {
        let features = vec![feature(1, 25.0, false)];
        let (_, nodes) = expand_lanes(&features, &LaneLinks::default(), 10.0);
        let positions: Vec<_> = nodes.iter().map(|n| n.position_in_lane).collect();
        assert_eq!(positions, vec![Some(0.0), Some(10.0), Some(20.0)]);
    }

    #[test]
    fn stopline_node_has_no_position() {
        let features = vec![feature(1, 20.0, true)];
        let (lanes, nodes) = expand_lanes(&features, &LaneLinks::default(), 10.0);
        assert_eq!(lanes[0].stopline_node, Some(1));
        assert_eq!(nodes[1].position_in_lane, None);
        assert_eq!(nodes[0].position_in_lane, Some(0.0));
    }

    #[test]
    fn lane_direct_link_becomes_boundary_edge() {
        let features = vec![feature(1, 20.0, false), feature(2, 20.0, false)];
        let links = LaneLinks {
            direct: vec![(1, 2)],
            ..Default::default()
        };
        let (_, nodes) = expand_lanes(&features, &links, 10.0);
        // Last node of lane 1 (id 1) links to first node of lane 2 (id 2).
        assert_eq!(nodes[1].node_connections.direct, vec![2]);
    }

    #[test]
    fn near_links_align_by_index_and_truncate() {
        let features = vec![feature(1, 30.0, false), feature(2, 20.0, false)];
        let links = LaneLinks {
            near: vec![(1, 2)],
            ..Default::default()
        };
        let (_, nodes) = expand_lanes(&features, &links, 10.0);
        // Lane 1 nodes: 0,1,2; lane 2 nodes: 3,4. Index 2 has no partner.
        assert_eq!(nodes[0].node_connections.near, vec![3]);
        assert_eq!(nodes[1].node_connections.near, vec![4]);
        assert!(nodes[2].node_connections.near.is_empty());
    }

    #[test]
    fn crossing_link_becomes_boundary_crossing_edge() {
        let features = vec![feature(1, 20.0, false), feature(2, 20.0, false)];
        let links = LaneLinks {
            crossing: vec![(1, 2)],
            ..Default::default()
        };
        let (_, nodes) = expand_lanes(&features, &links, 10.0);
        assert_eq!(nodes[1].node_connections.crossing, vec![2]);
    }

    #[test]
    fn edge_sets_stay_disjoint_under_conflicting_links() {
        let features = vec![feature(1, 10.0, false), feature(2, 10.0, false)];
        let links = LaneLinks {
            direct: vec![(1, 2)],
            near: vec![(1, 2)],
            crossing: vec![(1, 2)],
        };
        let (_, nodes) = expand_lanes(&features, &links, 10.0);
        assert_eq!(nodes[0].node_connections.direct, vec![1]);
        assert!(nodes[0].node_connections.near.is_empty());
        assert!(nodes[0].node_connections.crossing.is_empty());
    }
}
