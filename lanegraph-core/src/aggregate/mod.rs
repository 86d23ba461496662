//! Per-node, per-time-step traffic-state aggregation over sliding windows.
//!
//! For every node and every integer output step `t`, three independent
//! half-open windows `[t - w/2, t + w/2)` are evaluated: mean absolute speed,
//! distinct-vehicle flow, and a length-based occupancy ratio that can spill
//! across a node boundary. The output range is trimmed so every metric
//! always sees a fully populated window.

mod config;
mod record;

pub use config::{
    AggregationConfig, SpilloverPolicy, VehicleLengthSource, VehicleLengthTable,
};
pub use record::{
    AggregateRecord, AggregationOutput, AggregationSummary, write_records_csv,
};

use hashbrown::{HashMap, HashSet};
use log::info;
use rayon::prelude::*;

use crate::loading::TrajectoryTable;
use crate::model::{EdgeKind, Node, RoadGraph};
use crate::{Error, NodeId, VehicleId};

/// Frame-sorted sample positions of one node.
#[derive(Debug, Default)]
struct NodeSamples {
    indices: Vec<usize>,
    frames: Vec<f64>,
}

impl NodeSamples {
    /// Positions of the samples with frame in `[lo, hi)`.
    fn window(&self, lo: f64, hi: f64) -> &[usize] {
        let start = self.frames.partition_point(|&f| f < lo);
        let end = self.frames.partition_point(|&f| f < hi);
        &self.indices[start..end]
    }
}

/// Aggregate a frozen graph and trajectory table into per-node time series.
///
/// Every graph node is covered, connected or not; only occupancy spillover
/// consults connectivity. The table's unresolved-row counter is carried into
/// the summary so nothing disappears without a count.
///
/// # Errors
///
/// Returns an error if any window width is not positive.
pub fn aggregate(
    graph: &RoadGraph,
    table: &TrajectoryTable,
    config: &AggregationConfig,
) -> Result<AggregationOutput, Error> {
    if config.speed_window <= 0.0 || config.flow_window <= 0.0 || config.occupancy_window <= 0.0 {
        return Err(Error::InvalidData(
            "aggregation window widths must be positive".to_string(),
        ));
    }

    let mut summary = AggregationSummary {
        rows_read: table.rows_read(),
        unresolved_dropped: table.unresolved_dropped(),
        nodes: graph.nodes.len(),
        steps: 0,
    };

    // Restrict the output range so even the widest window is always fully
    // inside the observation span. A span shorter than the widest window
    // yields no output at all.
    let half = config.max_window() / 2.0;
    let steps: Vec<i64> = match table.frame_span() {
        Some((min_frame, max_frame)) => {
            let start = (min_frame + half).ceil() as i64;
            let end = (max_frame - half).floor() as i64;
            (start..=end).collect()
        }
        None => Vec::new(),
    };
    summary.steps = steps.len();
    if steps.is_empty() {
        info!("Observation span shorter than the widest window; no output steps");
        return Ok(AggregationOutput {
            records: Vec::new(),
            summary,
        });
    }

    let per_node = index_samples_by_node(table);
    let incoming = match config.spillover {
        SpilloverPolicy::BoundarySplit { .. } => index_incoming_spill(graph, table),
        SpilloverPolicy::Disabled => HashMap::new(),
    };

    info!(
        "Aggregating {} nodes over {} output steps ({} samples)",
        graph.nodes.len(),
        steps.len(),
        table.len()
    );

    let mut records: Vec<AggregateRecord> = graph
        .nodes
        .par_iter()
        .map(|node| {
            aggregate_node(
                node,
                per_node.get(&node.node_id),
                incoming.get(&node.node_id),
                table,
                config,
                &steps,
            )
        })
        .flatten()
        .collect();
    records.sort_by_key(|record| (record.node_id, record.time_step));

    Ok(AggregationOutput { records, summary })
}

fn index_samples_by_node(table: &TrajectoryTable) -> HashMap<NodeId, NodeSamples> {
    let mut per_node: HashMap<NodeId, Vec<usize>> = HashMap::new();
    for (idx, sample) in table.samples().iter().enumerate() {
        per_node.entry(sample.node_id).or_default().push(idx);
    }

    per_node
        .into_iter()
        .map(|(node_id, mut indices)| {
            indices.sort_by(|&a, &b| {
                table.samples()[a]
                    .frame
                    .total_cmp(&table.samples()[b].frame)
            });
            let frames = indices
                .iter()
                .map(|&idx| table.samples()[idx].frame)
                .collect();
            (node_id, NodeSamples { indices, frames })
        })
        .collect()
}

/// Samples whose vehicle is about to cross into a direct successor, indexed
/// by the receiving node and sorted by frame. These donate the spilled share
/// of the vehicle's length.
fn index_incoming_spill(
    graph: &RoadGraph,
    table: &TrajectoryTable,
) -> HashMap<NodeId, Vec<(f64, usize)>> {
    let connectivity = graph.connectivity();

    let mut incoming: HashMap<NodeId, Vec<(f64, usize)>> = HashMap::new();
    for (idx, sample) in table.samples().iter().enumerate() {
        if let Some(next) = table.imminent_transition(idx)
            && connectivity.edge_weight(sample.node_id, next) == Some(&EdgeKind::Direct)
        {
            incoming.entry(next).or_default().push((sample.frame, idx));
        }
    }
    for donors in incoming.values_mut() {
        donors.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    incoming
}

fn aggregate_node(
    node: &Node,
    samples: Option<&NodeSamples>,
    incoming: Option<&Vec<(f64, usize)>>,
    table: &TrajectoryTable,
    config: &AggregationConfig,
    steps: &[i64],
) -> Vec<AggregateRecord> {
    static EMPTY: NodeSamples = NodeSamples {
        indices: Vec::new(),
        frames: Vec::new(),
    };
    let samples = samples.unwrap_or(&EMPTY);

    let speed_half = config.speed_window / 2.0;
    let flow_half = config.flow_window / 2.0;
    let occupancy_half = config.occupancy_window / 2.0;

    steps
        .iter()
        .map(|&step| {
            let center = step as f64;

            let speed_window = samples.window(center - speed_half, center + speed_half);
            let avg_speed = (!speed_window.is_empty()).then(|| {
                let sum: f64 = speed_window
                    .iter()
                    .map(|&idx| table.samples()[idx].speed.abs())
                    .sum();
                sum / speed_window.len() as f64
            });

            let flow_window = samples.window(center - flow_half, center + flow_half);
            let vehicles: HashSet<VehicleId> = flow_window
                .iter()
                .map(|&idx| table.samples()[idx].vehicle_id)
                .collect();

            let avg_occupancy = occupancy(
                node,
                samples.window(center - occupancy_half, center + occupancy_half),
                incoming,
                table,
                config,
            );

            AggregateRecord {
                node_id: node.node_id,
                time_step: step,
                avg_speed,
                avg_occupancy,
                total_vehicles: vehicles.len() as u64,
            }
        })
        .collect()
}

/// Mean occupancy over the frames of `window`, each capped at 1.0.
///
/// Occupancy is evaluated per raw frame: vehicles sampled at the node
/// contribute their (possibly split) length, and vehicles one direct edge
/// upstream that are about to enter contribute the spilled remainder.
fn occupancy(
    node: &Node,
    window: &[usize],
    incoming: Option<&Vec<(f64, usize)>>,
    table: &TrajectoryTable,
    config: &AggregationConfig,
) -> f64 {
    if window.is_empty() {
        return 0.0;
    }

    let mut frame_ratios: Vec<f64> = Vec::new();
    let mut cursor = 0;
    while cursor < window.len() {
        let frame = table.samples()[window[cursor]].frame;
        let mut occupied = 0.0;

        // Run of samples sharing this raw frame.
        while cursor < window.len() && table.samples()[window[cursor]].frame == frame {
            let idx = window[cursor];
            let sample = &table.samples()[idx];
            let length = config.vehicle_length.length_of(sample);

            let share = match config.spillover {
                SpilloverPolicy::Disabled => 1.0,
                SpilloverPolicy::BoundarySplit { current_share } => {
                    let crosses_direct = table
                        .imminent_transition(idx)
                        .is_some_and(|next| node.node_connections.direct.contains(&next));
                    if crosses_direct { current_share } else { 1.0 }
                }
            };
            occupied += length * share;
            cursor += 1;
        }

        if let (SpilloverPolicy::BoundarySplit { current_share }, Some(donors)) =
            (config.spillover, incoming)
        {
            let start = donors.partition_point(|&(f, _)| f < frame);
            let end = donors.partition_point(|&(f, _)| f <= frame);
            for &(_, idx) in &donors[start..end] {
                let length = config.vehicle_length.length_of(&table.samples()[idx]);
                occupied += length * (1.0 - current_share);
            }
        }

        frame_ratios.push((occupied / node.segment_length).min(1.0));
    }

    frame_ratios.iter().sum::<f64>() / frame_ratios.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::{TrajectorySample, VehicleClass};
    use crate::model::{Lane, NodeConnections};

    fn sample(vehicle_id: u64, frame: f64, node_id: u64, speed: f64) -> TrajectorySample {
        TrajectorySample {
            vehicle_id,
            frame,
            node_id,
            speed,
            length: None,
            class: Some(VehicleClass::Car),
        }
    }

    fn graph_with_chain() -> RoadGraph {
        // Two 10 m nodes on one lane, 0 -> 1 direct.
        let mut first = Node {
            node_id: 0,
            lane_id: 1,
            position_in_lane: Some(0.0),
            segment_length: 10.0,
            node_connections: NodeConnections::default(),
        };
        first.node_connections.direct.push(1);
        RoadGraph {
            lanes: vec![Lane {
                lane_id: 1,
                nodes: vec![0, 1],
                stopline_node: None,
                segment_length: 10.0,
                total_length: 20.0,
                downstream_connections: vec![],
            }],
            nodes: vec![
                first,
                Node {
                    node_id: 1,
                    lane_id: 1,
                    position_in_lane: Some(10.0),
                    segment_length: 10.0,
                    node_connections: NodeConnections::default(),
                },
            ],
        }
    }

    fn uniform_config(window: f64) -> AggregationConfig {
        AggregationConfig {
            speed_window: window,
            flow_window: window,
            occupancy_window: window,
            ..AggregationConfig::default()
        }
    }

    fn records_for(output: &AggregationOutput, node_id: u64) -> Vec<&AggregateRecord> {
        output
            .records
            .iter()
            .filter(|r| r.node_id == node_id)
            .collect()
    }

    #[test]
    fn speed_and_flow_over_a_two_second_window() {
        let graph = graph_with_chain();
        // Padding samples keep t=11 inside the trimmed output range.
        let table = TrajectoryTable::new(vec![
            sample(1, 10.0, 0, 30.0),
            sample(2, 11.0, 0, 50.0),
            sample(1, 12.0, 0, 10.0),
        ]);
        let output = aggregate(&graph, &table, &uniform_config(2.0)).unwrap();

        let record = output
            .records
            .iter()
            .find(|r| r.node_id == 0 && r.time_step == 11)
            .unwrap();
        // Window [10, 12): samples at 10 and 11.
        assert_eq!(record.avg_speed, Some(40.0));
        assert_eq!(record.total_vehicles, 2);
    }

    #[test]
    fn empty_window_yields_null_speed_and_zeros() {
        let graph = graph_with_chain();
        // All samples on node 0; node 1 never observed but still aggregated.
        let table = TrajectoryTable::new(vec![
            sample(1, 10.0, 0, 30.0),
            sample(1, 12.0, 0, 30.0),
        ]);
        let output = aggregate(&graph, &table, &uniform_config(2.0)).unwrap();

        let unobserved = records_for(&output, 1);
        assert!(!unobserved.is_empty());
        for record in unobserved {
            assert_eq!(record.avg_speed, None);
            assert_eq!(record.avg_occupancy, 0.0);
            assert_eq!(record.total_vehicles, 0);
        }
    }

    #[test]
    fn speed_uses_absolute_values() {
        let graph = graph_with_chain();
        let table = TrajectoryTable::new(vec![
            sample(1, 10.0, 0, -30.0),
            sample(2, 11.0, 0, 50.0),
            sample(1, 12.0, 0, -10.0),
        ]);
        let output = aggregate(&graph, &table, &uniform_config(2.0)).unwrap();
        let record = output
            .records
            .iter()
            .find(|r| r.node_id == 0 && r.time_step == 11)
            .unwrap();
        assert_eq!(record.avg_speed, Some(40.0));
    }

    #[test]
    fn occupancy_is_capped_at_one() {
        let graph = graph_with_chain();
        // Five cars of 4 m in one 10 m node at the same frame; the padding
        // vehicle rides the other node so it cannot dilute the average.
        let mut samples: Vec<TrajectorySample> = (0..5)
            .map(|v| sample(v, 11.0, 0, 5.0))
            .collect();
        samples.push(sample(9, 10.0, 1, 5.0));
        samples.push(sample(9, 12.0, 1, 5.0));
        let table = TrajectoryTable::new(samples);
        let output = aggregate(&graph, &table, &uniform_config(2.0)).unwrap();

        for record in records_for(&output, 0) {
            assert!(record.avg_occupancy <= 1.0);
        }
        let record = output
            .records
            .iter()
            .find(|r| r.node_id == 0 && r.time_step == 11)
            .unwrap();
        assert_eq!(record.avg_occupancy, 1.0);
    }

    #[test]
    fn boundary_spillover_splits_length_across_direct_successor() {
        let graph = graph_with_chain();
        // Vehicle 1 crosses 0 -> 1 between frames 11 and 12, so its frame-11
        // sample sits at the boundary. Vehicle 2 keeps node 1 observed.
        let table = TrajectoryTable::new(vec![
            sample(1, 10.0, 0, 20.0),
            sample(1, 11.0, 0, 20.0),
            sample(1, 12.0, 1, 20.0),
            sample(2, 11.0, 1, 20.0),
            sample(2, 12.0, 1, 20.0),
        ]);
        let config = AggregationConfig {
            speed_window: 2.0,
            flow_window: 2.0,
            occupancy_window: 2.0,
            ..AggregationConfig::default()
        };
        let output = aggregate(&graph, &table, &config).unwrap();

        // Node 0 at t=11, window [10, 12): frame 10 contributes the full 4 m
        // (no boundary yet), frame 11 contributes 3 m (75% share).
        let node0 = output
            .records
            .iter()
            .find(|r| r.node_id == 0 && r.time_step == 11)
            .unwrap();
        assert!((node0.avg_occupancy - (0.4 + 0.3) / 2.0).abs() < 1e-9);

        // Node 1 at t=11: its own frame-11 sample (4 m) plus the 1 m spilled
        // in from vehicle 1.
        let node1 = output
            .records
            .iter()
            .find(|r| r.node_id == 1 && r.time_step == 11)
            .unwrap();
        assert!((node1.avg_occupancy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn disabled_spillover_keeps_full_length_local() {
        let graph = graph_with_chain();
        let table = TrajectoryTable::new(vec![
            sample(1, 10.0, 0, 20.0),
            sample(1, 11.0, 0, 20.0),
            sample(1, 12.0, 1, 20.0),
        ]);
        let config = AggregationConfig {
            spillover: SpilloverPolicy::Disabled,
            ..uniform_config(2.0)
        };
        let output = aggregate(&graph, &table, &config).unwrap();
        let node0 = output
            .records
            .iter()
            .find(|r| r.node_id == 0 && r.time_step == 11)
            .unwrap();
        assert!((node0.avg_occupancy - 0.4).abs() < 1e-9);
    }

    #[test]
    fn observed_length_source_reads_the_width_field() {
        let graph = graph_with_chain();
        let mut long_vehicle = sample(1, 11.0, 0, 20.0);
        long_vehicle.length = Some(8.0);
        let table = TrajectoryTable::new(vec![
            sample(2, 10.0, 0, 20.0),
            long_vehicle,
            sample(2, 12.0, 0, 20.0),
        ]);
        let config = AggregationConfig {
            vehicle_length: VehicleLengthSource::Observed {
                default_length: 4.0,
            },
            spillover: SpilloverPolicy::Disabled,
            ..uniform_config(2.0)
        };
        let output = aggregate(&graph, &table, &config).unwrap();
        let record = output
            .records
            .iter()
            .find(|r| r.node_id == 0 && r.time_step == 11)
            .unwrap();
        // Frame 10: 4 m default; frame 11: 8 m observed.
        assert!((record.avg_occupancy - (0.4 + 0.8) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn span_shorter_than_widest_window_yields_no_steps() {
        let graph = graph_with_chain();
        let table = TrajectoryTable::new(vec![
            sample(1, 0.0, 0, 10.0),
            sample(1, 4.0, 0, 10.0),
        ]);
        let output = aggregate(&graph, &table, &AggregationConfig::default()).unwrap();
        assert!(output.records.is_empty());
        assert_eq!(output.summary.steps, 0);
    }

    #[test]
    fn summary_carries_unresolved_counter() {
        let graph = graph_with_chain();
        let table = TrajectoryTable::new(vec![]);
        let output = aggregate(&graph, &table, &AggregationConfig::default()).unwrap();
        assert_eq!(output.summary.rows_read, 0);
        assert_eq!(output.summary.nodes, 2);
    }

    #[test]
    fn nonpositive_window_is_rejected() {
        let graph = graph_with_chain();
        let table = TrajectoryTable::new(vec![]);
        let config = AggregationConfig {
            speed_window: 0.0,
            ..AggregationConfig::default()
        };
        assert!(aggregate(&graph, &table, &config).is_err());
    }
}
