use super::ClassifierVariant;

/// Tunable parameters of one graph-construction run.
///
/// All thresholds are in meters and assume projected coordinates.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Node length; each lane yields `ceil(total_length / segment_length)`
    /// nodes.
    pub segment_length: f64,
    /// Radius of the adjacent-lane candidate search, on the order of one to
    /// two lane widths.
    pub near_threshold: f64,
    /// Minimum centroid distance for an observed jump to count as a crossing;
    /// closer pairs are treated as coincident-id noise.
    pub crossing_min_distance: f64,
    /// Strategy for resolving observed transitions into direct/near/noise.
    pub classifier: ClassifierVariant,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            segment_length: 10.0,
            near_threshold: 6.0,
            crossing_min_distance: 2.0,
            classifier: ClassifierVariant::CountThreshold { min_count: 1 },
        }
    }
}
