//! Data model for the reconstructed road network
//!
//! Contains the persisted graph document (lanes plus their fixed-length
//! nodes) and the in-memory lane feature table it is built from.

mod graph;
mod lane;
mod node;

pub use graph::RoadGraph;
pub use lane::{Lane, LaneConnection, LaneFeature};
pub use node::{EdgeKind, Node, NodeConnections};
