//! Road-network graph reconstruction and windowed traffic-state aggregation.
//!
//! The crate covers two coupled subsystems operating over batch trajectory
//! logs:
//!
//! - **Graph construction** ([`loading::build_road_graph`]): derives directed
//!   `direct`/`near`/`crossing` connectivity between lanes from spatial
//!   proximity and observed vehicle transitions, subdivides lanes into
//!   fixed-length nodes and assembles one persisted [`model::RoadGraph`]
//!   document.
//! - **Windowed aggregation** ([`aggregate::aggregate`]): converts per-vehicle
//!   trajectory samples into per-node time series of average speed, occupancy
//!   and flow, with independently sized sliding windows per metric.
//!
//! Everything is a single-pass, no-mutation-in-place batch pipeline: a graph
//! is built once and frozen before any aggregation run reads it.

pub mod aggregate;
pub mod error;
pub mod graph;
pub mod loading;
pub mod model;
pub mod prelude;

pub use error::Error;

/// Stable identifier of a lane feature.
pub type LaneId = u64;

/// Globally unique identifier of a fixed-length lane sub-segment.
pub type NodeId = u64;

/// Identifier of one tracked vehicle.
pub type VehicleId = u64;

/// Observation timestamp in seconds relative to the start of the recording.
pub type Frame = f64;
