use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;

use crate::{Error, NodeId};

/// Traffic state of one node over one output time step.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub node_id: NodeId,
    /// Output time step (the sliding-window center), in whole seconds.
    pub time_step: i64,
    /// Mean absolute speed over the speed window; `None` when the window is
    /// empty. An unobserved node is not a congested one.
    pub avg_speed: Option<f64>,
    /// Mean occupancy ratio over the occupancy window, in `[0, 1]`.
    pub avg_occupancy: f64,
    /// Distinct vehicles in the flow window.
    pub total_vehicles: u64,
}

impl AggregateRecord {
    /// Bounded flow feature `log(1 + n) / log(base)`. The raw count remains
    /// the ground truth; this is only a model input scaling.
    pub fn flow_feature(&self, base: f64) -> f64 {
        (1.0 + self.total_vehicles as f64).ln() / base.ln()
    }
}

/// Per-record data-quality counters of one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregationSummary {
    /// Rows read from the trajectory file, before any filtering.
    pub rows_read: u64,
    /// Rows dropped upstream for lacking a resolved node id.
    pub unresolved_dropped: u64,
    /// Nodes covered (every graph node, connected or not).
    pub nodes: usize,
    /// Output time steps per node.
    pub steps: usize,
}

/// Records plus the run summary.
#[derive(Debug)]
pub struct AggregationOutput {
    pub records: Vec<AggregateRecord>,
    pub summary: AggregationSummary,
}

/// Write aggregated records as
/// `node_id,start_frame,avg_speed,avg_occupancy,total_vehicles`.
///
/// An empty `avg_speed` field encodes "no data". When `flow_scale_base` is
/// set, the vehicle count column carries the compressed flow feature instead
/// of the raw count.
pub fn write_records_csv(
    path: &Path,
    records: &[AggregateRecord],
    flow_scale_base: Option<f64>,
) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer.write_record([
        "node_id",
        "start_frame",
        "avg_speed",
        "avg_occupancy",
        "total_vehicles",
    ])?;

    for record in records {
        let speed = record
            .avg_speed
            .map(|v| format!("{v:.2}"))
            .unwrap_or_default();
        let vehicles = match flow_scale_base {
            Some(base) => format!("{:.2}", record.flow_feature(base)),
            None => record.total_vehicles.to_string(),
        };
        writer.write_record([
            record.node_id.to_string(),
            record.time_step.to_string(),
            speed,
            format!("{:.2}", record.avg_occupancy),
            vehicles,
        ])?;
    }
    writer.flush()?;
    info!(
        "Wrote {} aggregated records to '{}'",
        records.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_feature_is_log_compressed() {
        let record = AggregateRecord {
            node_id: 1,
            time_step: 0,
            avg_speed: None,
            avg_occupancy: 0.0,
            total_vehicles: 7,
        };
        assert!((record.flow_feature(8.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn csv_encodes_missing_speed_as_empty_field() {
        let records = vec![
            AggregateRecord {
                node_id: 1,
                time_step: 10,
                avg_speed: Some(33.333),
                avg_occupancy: 0.5,
                total_vehicles: 3,
            },
            AggregateRecord {
                node_id: 1,
                time_step: 11,
                avg_speed: None,
                avg_occupancy: 0.0,
                total_vehicles: 0,
            },
        ];
        let path = std::env::temp_dir().join("lanegraph_records.csv");
        write_records_csv(&path, &records, None).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("node_id,start_frame,avg_speed,avg_occupancy,total_vehicles")
        );
        assert_eq!(lines.next(), Some("1,10,33.33,0.50,3"));
        assert_eq!(lines.next(), Some("1,11,,0.00,0"));
    }
}
