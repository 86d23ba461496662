//! Batch command-line surface over the lanegraph core pipeline.
//!
//! Four file-based subcommands mirror the pipeline stages: `transitions`,
//! `build-graph`, `validate` and `aggregate`. There is no long-lived
//! process; every invocation reads its inputs, writes one artifact and
//! exits.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lanegraph_core::graph::merge_classified;
use lanegraph_core::model::EdgeKind;
use lanegraph_core::prelude::*;

#[derive(Parser)]
#[command(
    name = "lanegraph",
    version,
    about = "Road-network graph reconstruction and traffic-state aggregation"
)]
struct Cli {
    /// Log filter, e.g. `info` or `lanegraph_core=debug`.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract segment-to-segment transition counts from a trajectory file.
    Transitions {
        /// Trajectory CSV with resolved segment ids.
        trajectory: PathBuf,
        /// Output transition statistics CSV.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a road-graph document from lane features and trajectories.
    BuildGraph(BuildGraphArgs),
    /// Check a graph document for structural errors and warnings.
    Validate {
        /// Graph JSON document.
        graph: PathBuf,
    },
    /// Aggregate per-node traffic state from a trajectory file.
    Aggregate(AggregateArgs),
}

#[derive(Args)]
struct BuildGraphArgs {
    /// Lane feature CSV (lane_id, join_fid, x, y, length).
    #[arg(long)]
    lanes: PathBuf,
    /// Trajectory CSV tagged at lane granularity.
    #[arg(long)]
    trajectory: PathBuf,
    /// Output graph JSON document.
    #[arg(short, long)]
    output: PathBuf,
    /// Optional node-granularity transition CSV to merge after expansion.
    #[arg(long)]
    node_transitions: Option<PathBuf>,
    #[arg(long, default_value_t = 10.0)]
    segment_length: f64,
    #[arg(long, default_value_t = 6.0)]
    near_threshold: f64,
    #[arg(long, default_value_t = 2.0)]
    crossing_min_distance: f64,
    /// Use the lower-quartile noise cut instead of an absolute count.
    #[arg(long)]
    quartile_classifier: bool,
    /// Noise threshold of the count classifier.
    #[arg(long, default_value_t = 1)]
    min_count: u64,
}

#[derive(Args)]
struct AggregateArgs {
    /// Graph JSON document.
    #[arg(long)]
    graph: PathBuf,
    /// Trajectory CSV tagged at node granularity.
    #[arg(long)]
    trajectory: PathBuf,
    /// Output per-node traffic-state CSV.
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, default_value_t = 2.0)]
    speed_window: f64,
    #[arg(long, default_value_t = 10.0)]
    flow_window: f64,
    #[arg(long, default_value_t = 4.0)]
    occupancy_window: f64,
    /// Take vehicle lengths from the observed width field instead of the
    /// per-class table.
    #[arg(long)]
    observed_length: bool,
    /// Disable occupancy spillover into the direct successor.
    #[arg(long)]
    no_spillover: bool,
    /// Share of a boundary vehicle's length kept on its current node.
    #[arg(long, default_value_t = 0.75)]
    spillover_share: f64,
    /// Log-compress the vehicle count column with this base at export.
    #[arg(long)]
    flow_scale_base: Option<f64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)),
        )
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, Error> {
    match command {
        Command::Transitions { trajectory, output } => {
            let table = TrajectoryTable::from_csv_file(&trajectory)?;
            let counts = extract_transitions(&table);
            counts.write_csv(&output)?;
            info!(
                "{} transition pairs written ({} unresolved rows dropped)",
                counts.len(),
                table.unresolved_dropped()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::BuildGraph(args) => build_graph(args),
        Command::Validate { graph } => validate_document(&graph),
        Command::Aggregate(args) => aggregate_trajectory(args),
    }
}

fn build_graph(args: BuildGraphArgs) -> Result<ExitCode, Error> {
    let classifier = if args.quartile_classifier {
        ClassifierVariant::LowerQuartile
    } else {
        ClassifierVariant::CountThreshold {
            min_count: args.min_count,
        }
    };
    let config = GraphConfig {
        segment_length: args.segment_length,
        near_threshold: args.near_threshold,
        crossing_min_distance: args.crossing_min_distance,
        classifier,
    };

    let features = load_lane_features(&args.lanes)?;
    let table = TrajectoryTable::from_csv_file(&args.trajectory)?;
    let outcome = build_road_graph(&features, &table, &config)?;
    let mut graph = outcome.graph;

    if let Some(path) = args.node_transitions {
        let counts = TransitionCounts::from_csv_file(&path)?;
        let (classified, noise) = lanegraph_core::graph::classify(&counts, config.classifier);
        let stats = merge_classified(&mut graph, &classified);
        info!(
            "Node-level evidence: {} direct and {} near edges added, {} unmatched, {} noise discarded",
            stats.direct_added, stats.near_added, stats.unmatched, noise
        );
    }

    graph.to_json_file(&args.output)?;
    info!(
        "Graph written to '{}' ({} noise transitions discarded, {} crossings rejected)",
        args.output.display(),
        outcome.stats.noise_discarded,
        outcome.stats.crossing_rejected
    );
    Ok(ExitCode::SUCCESS)
}

fn validate_document(path: &PathBuf) -> Result<ExitCode, Error> {
    let graph = RoadGraph::from_json_file(path)?;
    let report = validate(&graph);

    for finding in &report.warnings {
        warn!("warning: {finding}");
    }
    for finding in &report.errors {
        error!("error: {finding}");
    }

    let direct: usize = graph
        .nodes
        .iter()
        .flat_map(|n| n.node_connections.iter())
        .filter(|(kind, _)| *kind == EdgeKind::Direct)
        .count();
    info!(
        "{} lanes, {} nodes, {} direct edges; {report}",
        graph.lanes.len(),
        graph.nodes.len(),
        direct
    );

    if report.has_errors() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn aggregate_trajectory(args: AggregateArgs) -> Result<ExitCode, Error> {
    let spillover = if args.no_spillover {
        SpilloverPolicy::Disabled
    } else {
        SpilloverPolicy::BoundarySplit {
            current_share: args.spillover_share,
        }
    };
    let vehicle_length = if args.observed_length {
        VehicleLengthSource::Observed {
            default_length: 4.0,
        }
    } else {
        VehicleLengthSource::ClassTable(VehicleLengthTable::default())
    };
    let config = AggregationConfig {
        speed_window: args.speed_window,
        flow_window: args.flow_window,
        occupancy_window: args.occupancy_window,
        vehicle_length,
        spillover,
        flow_scale_base: args.flow_scale_base,
    };

    let graph = RoadGraph::from_json_file(&args.graph)?;
    let table = TrajectoryTable::from_csv_file(&args.trajectory)?;
    let output = aggregate(&graph, &table, &config)?;
    write_records_csv(&args.output, &output.records, config.flow_scale_base)?;

    let summary = output.summary;
    info!(
        "{} records over {} nodes and {} steps ({} rows read, {} unresolved dropped)",
        output.records.len(),
        summary.nodes,
        summary.steps,
        summary.rows_read,
        summary.unresolved_dropped
    );
    Ok(ExitCode::SUCCESS)
}
