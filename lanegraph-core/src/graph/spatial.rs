//! Geometric candidate connections between lanes.

use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::LaneId;
use crate::model::LaneFeature;

type IndexedCentroid = GeomWithData<[f64; 2], LaneId>;

/// Sequential links within each physical road.
///
/// Lanes sharing a `join_fid` are ordered by the angle of their centroid
/// around the group's centroid mean and each lane links to its angular
/// successor. Links are directional (one-way roads get no reverse edge) and
/// the ordering assumes the group lies roughly on a single arc; groups
/// looping through more than one rotation degenerate. Lanes without a
/// `join_fid` are singleton groups and emit nothing.
pub fn direct_links(features: &[LaneFeature]) -> Vec<(LaneId, LaneId)> {
    let mut groups: HashMap<&str, Vec<&LaneFeature>> = HashMap::new();
    for feature in features {
        if let Some(join_fid) = feature.join_fid.as_deref() {
            groups.entry(join_fid).or_default().push(feature);
        }
    }

    let mut links = Vec::new();
    for join_fid in groups.keys().sorted() {
        let group = &groups[join_fid];
        if group.len() <= 1 {
            continue;
        }

        let mean_x = group.iter().map(|f| f.centroid.x()).sum::<f64>() / group.len() as f64;
        let mean_y = group.iter().map(|f| f.centroid.y()).sum::<f64>() / group.len() as f64;

        let ordered: Vec<LaneId> = group
            .iter()
            .map(|f| {
                let angle = (f.centroid.y() - mean_y).atan2(f.centroid.x() - mean_x);
                (angle, f.lane_id)
            })
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, lane_id)| lane_id)
            .collect();

        debug!("Road group {join_fid}: {} lanes in angular order", ordered.len());
        for pair in ordered.windows(2) {
            links.push((pair[0], pair[1]));
        }
    }
    links
}

/// Laterally adjacent lane candidates within `radius` meters.
///
/// Neighbors sharing the origin's `join_fid` are excluded (the sequential
/// links already cover them). Candidates are provisional until validated
/// against observed transitions.
pub fn near_candidates(features: &[LaneFeature], radius: f64) -> Vec<(LaneId, LaneId)> {
    let tree: RTree<IndexedCentroid> = RTree::bulk_load(
        features
            .iter()
            .map(|f| GeomWithData::new([f.centroid.x(), f.centroid.y()], f.lane_id))
            .collect(),
    );
    let by_id: HashMap<LaneId, &LaneFeature> =
        features.iter().map(|f| (f.lane_id, f)).collect();

    let mut candidates = Vec::new();
    for feature in features {
        let center = [feature.centroid.x(), feature.centroid.y()];
        for found in tree.locate_within_distance(center, radius * radius) {
            let neighbor_id = found.data;
            if neighbor_id == feature.lane_id {
                continue;
            }
            let neighbor = by_id[&neighbor_id];
            if let (Some(a), Some(b)) = (&feature.join_fid, &neighbor.join_fid)
                && a == b
            {
                continue;
            }
            candidates.push((feature.lane_id, neighbor_id));
        }
    }
    candidates.sort_unstable();
    candidates
}
