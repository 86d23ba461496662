// Re-export key components
pub use crate::aggregate::{
    AggregateRecord, AggregationConfig, AggregationOutput, AggregationSummary, SpilloverPolicy,
    VehicleLengthSource, VehicleLengthTable, aggregate, write_records_csv,
};
pub use crate::error::Error;
pub use crate::graph::validate::validate;
pub use crate::graph::{
    ClassifierVariant, GraphConfig, TransitionCounts, ValidationReport, extract_transitions,
};
pub use crate::loading::{
    BuildOutcome, TrajectorySample, TrajectoryTable, build_road_graph, load_lane_features,
};
pub use crate::model::{Lane, LaneFeature, Node, NodeConnections, RoadGraph};

// Core identifier types
pub use crate::Frame;
pub use crate::LaneId;
pub use crate::NodeId;
pub use crate::VehicleId;
