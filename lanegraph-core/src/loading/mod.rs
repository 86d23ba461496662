//! This module is responsible for loading batch inputs (lane feature tables,
//! trajectory logs) and for the one-call graph-construction entry point.

mod lanes;
pub mod trajectory;

pub use lanes::load_lane_features;
pub use trajectory::{TrajectorySample, TrajectoryTable, VehicleClass};

use log::info;

use crate::Error;
use crate::graph::{self, GraphConfig, ResolveStats};
use crate::model::{LaneFeature, RoadGraph};

/// Result of one graph-construction run: the frozen document plus the
/// data-quality counters accumulated along the way.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: RoadGraph,
    pub stats: ResolveStats,
}

/// Build a road-network graph from lane features and a trajectory table
/// tagged at lane granularity.
///
/// Pipeline: spatial candidates, transition extraction, classification into
/// `direct`/`near`/`crossing`, node expansion, assembly. The returned
/// document has been validated; structural errors abort the run.
///
/// # Errors
///
/// Returns an error if the feature table is empty or the assembled document
/// violates a structural invariant.
pub fn build_road_graph(
    features: &[LaneFeature],
    table: &TrajectoryTable,
    config: &GraphConfig,
) -> Result<BuildOutcome, Error> {
    if features.is_empty() {
        return Err(Error::InvalidData(
            "cannot build a graph from an empty lane feature table".to_string(),
        ));
    }

    info!(
        "Building road graph from {} lanes and {} trajectory samples",
        features.len(),
        table.len()
    );

    let transitions = graph::extract_transitions(table);
    let (links, stats) = graph::resolve_lane_links(features, &transitions, config);
    let (lanes, nodes) = graph::expand_lanes(features, &links, config.segment_length);
    let graph = graph::assemble(lanes, nodes)?;

    Ok(BuildOutcome { graph, stats })
}
