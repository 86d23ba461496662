//! Graph construction: geometric candidates, transition evidence,
//! classification, node expansion and final assembly.

mod assemble;
mod classify;
mod config;
mod expand;
mod spatial;
mod transitions;
pub mod validate;

pub use assemble::{MergeStats, assemble, merge_classified};
pub use classify::{ClassifiedConnections, ClassifierVariant, classify};
pub use config::GraphConfig;
pub use expand::expand_lanes;
pub use spatial::{direct_links, near_candidates};
pub use transitions::{TransitionCounts, extract_transitions};
pub use validate::{Finding, ValidationReport};

use geo::{Distance, Euclidean};
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::{info, warn};

use crate::LaneId;
use crate::model::LaneFeature;

/// Lane-level connectivity resolved from geometry and trajectory evidence.
#[derive(Debug, Clone, Default)]
pub struct LaneLinks {
    pub direct: Vec<(LaneId, LaneId)>,
    pub near: Vec<(LaneId, LaneId)>,
    pub crossing: Vec<(LaneId, LaneId)>,
}

/// Per-record data-quality counters of one link-resolution run. None of these
/// are errors; they are surfaced so no evidence is dropped without a count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveStats {
    /// Transitions discarded by the classifier's noise cut.
    pub noise_discarded: u64,
    /// Observed jumps rejected as crossings because the endpoints are closer
    /// than the configured minimum distance (coincident-id noise).
    pub crossing_rejected: u64,
    /// Transitions naming lane ids absent from the feature table.
    pub unknown_ids: u64,
}

/// Resolve lane-level links from geometric candidates and observed
/// transitions.
///
/// Sequential `direct` links come from geometry alone. A `near` candidate
/// survives only if the classifier keeps at least the exact ordered pair
/// above its noise cut. Surviving transition pairs covered by neither set
/// become `crossing` links, provided the centroids are at least
/// `crossing_min_distance` apart.
pub fn resolve_lane_links(
    features: &[LaneFeature],
    transitions: &TransitionCounts,
    config: &GraphConfig,
) -> (LaneLinks, ResolveStats) {
    let mut stats = ResolveStats::default();

    let direct = direct_links(features);
    let candidates = near_candidates(features, config.near_threshold);

    let (classified, noise_discarded) = classify(transitions, config.classifier);
    stats.noise_discarded = noise_discarded;

    // Ordered pairs that survived the noise cut, regardless of class.
    let mut surviving: HashSet<(LaneId, LaneId)> = HashSet::new();
    for (&from, classes) in &classified {
        for &to in classes.direct.iter().chain(&classes.near) {
            surviving.insert((from, to));
        }
    }

    let near: Vec<(LaneId, LaneId)> = candidates
        .into_iter()
        .filter(|pair| surviving.contains(pair))
        .collect();

    let direct_set: HashSet<(LaneId, LaneId)> = direct.iter().copied().collect();
    let near_set: HashSet<(LaneId, LaneId)> = near.iter().copied().collect();
    let centroids: HashMap<LaneId, geo::Point<f64>> = features
        .iter()
        .map(|feature| (feature.lane_id, feature.centroid))
        .collect();

    let mut crossing = Vec::new();
    for &(from, to) in surviving.iter().sorted() {
        if direct_set.contains(&(from, to)) || near_set.contains(&(from, to)) {
            continue;
        }
        let (Some(origin), Some(target)) = (centroids.get(&from), centroids.get(&to)) else {
            stats.unknown_ids += 1;
            continue;
        };
        if Euclidean.distance(*origin, *target) < config.crossing_min_distance {
            stats.crossing_rejected += 1;
            continue;
        }
        crossing.push((from, to));
    }

    if stats.unknown_ids > 0 {
        warn!(
            "{} observed transitions name lane ids absent from the feature table",
            stats.unknown_ids
        );
    }
    info!(
        "Resolved lane links: {} direct, {} near, {} crossing ({} noise discarded, {} crossings rejected as too close)",
        direct.len(),
        near.len(),
        crossing.len(),
        stats.noise_discarded,
        stats.crossing_rejected
    );

    (
        LaneLinks {
            direct,
            near,
            crossing,
        },
        stats,
    )
}
