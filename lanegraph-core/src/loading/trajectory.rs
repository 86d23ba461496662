//! Trajectory sample loading and the per-vehicle forward index.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::{Error, Frame, NodeId, VehicleId};

/// Vehicle class reported by the upstream tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClass {
    Car,
    Medium,
    Heavy,
    Motorcycle,
}

impl VehicleClass {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "car" => Some(Self::Car),
            "medium" => Some(Self::Medium),
            "heavy" => Some(Self::Heavy),
            "motorcycle" => Some(Self::Motorcycle),
            _ => None,
        }
    }
}

/// One trajectory observation, already resolved to a node by the upstream
/// spatial join.
#[derive(Debug, Clone)]
pub struct TrajectorySample {
    pub vehicle_id: VehicleId,
    pub frame: Frame,
    pub node_id: NodeId,
    /// Signed speed as reported; aggregation uses the absolute value.
    pub speed: f64,
    /// Observed vehicle length (longest side) in meters, when the tracker
    /// provides one.
    pub length: Option<f64>,
    pub class: Option<VehicleClass>,
}

/// Raw CSV row; the aliases cover the column-name variants in circulation
/// across recording campaigns.
#[derive(Debug, Deserialize)]
struct RawSample {
    id: VehicleId,
    #[serde(alias = "start_time")]
    frame: f64,
    #[serde(default, alias = "FID", alias = "fid")]
    node_id: Option<String>,
    #[serde(alias = "speed_kmh", alias = "v")]
    speed: f64,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    car_type: Option<String>,
}

/// Sorted trajectory samples plus the forward index reused by transition
/// extraction and occupancy spillover.
///
/// The forward index answers, for every sample, which node the vehicle
/// reaches next (its next *differing* node) and whether that change happens
/// at the immediately following sample; the latter marks a vehicle at a node
/// boundary. It is computed once, in a single backward pass per vehicle,
/// instead of re-scanning the table per node per window.
#[derive(Debug, Clone)]
pub struct TrajectoryTable {
    samples: Vec<TrajectorySample>,
    next_node: Vec<Option<NodeId>>,
    imminent: Vec<bool>,
    rows_read: u64,
    unresolved_dropped: u64,
}

impl TrajectoryTable {
    /// Build a table from resolved samples. Sorts by `(vehicle, frame)` and
    /// computes the forward index.
    pub fn new(samples: Vec<TrajectorySample>) -> Self {
        let rows = samples.len() as u64;
        Self::with_stats(samples, rows, 0)
    }

    fn with_stats(
        mut samples: Vec<TrajectorySample>,
        rows_read: u64,
        unresolved_dropped: u64,
    ) -> Self {
        samples.sort_by(|a, b| {
            a.vehicle_id
                .cmp(&b.vehicle_id)
                .then(a.frame.total_cmp(&b.frame))
        });

        let n = samples.len();
        let mut next_node: Vec<Option<NodeId>> = vec![None; n];
        let mut imminent = vec![false; n];
        for i in (0..n.saturating_sub(1)).rev() {
            if samples[i].vehicle_id != samples[i + 1].vehicle_id {
                continue;
            }
            if samples[i + 1].node_id != samples[i].node_id {
                next_node[i] = Some(samples[i + 1].node_id);
                imminent[i] = true;
            } else {
                next_node[i] = next_node[i + 1];
            }
        }

        Self {
            samples,
            next_node,
            imminent,
            rows_read,
            unresolved_dropped,
        }
    }

    /// Load a trajectory CSV. Rows with an empty or unparsable node id are
    /// dropped and counted, never an error; a missing required column aborts.
    pub fn from_csv_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to open file '{}': {}", path.display(), e),
            )
        })?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();
        for (canonical, accepted) in [
            ("id", &["id"][..]),
            ("frame", &["frame", "start_time"][..]),
            ("node_id", &["node_id", "FID", "fid"][..]),
            ("speed", &["speed", "speed_kmh", "v"][..]),
        ] {
            if !headers.iter().any(|h| accepted.contains(&h.trim())) {
                return Err(Error::MissingColumn {
                    column: canonical,
                    file: path.to_path_buf(),
                });
            }
        }

        let mut samples = Vec::new();
        let mut rows_read = 0u64;
        let mut unresolved = 0u64;
        for row in reader.deserialize::<RawSample>() {
            let row = row?;
            rows_read += 1;

            // Upstream files store node ids as floats ("42.0"); anything that
            // does not resolve to a node is an unresolved sample.
            let node_id = row
                .node_id
                .as_deref()
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|id| id.is_finite() && *id >= 0.0)
                .map(|id| id as NodeId);
            let Some(node_id) = node_id else {
                unresolved += 1;
                continue;
            };

            samples.push(TrajectorySample {
                vehicle_id: row.id,
                frame: row.frame,
                node_id,
                speed: row.speed,
                length: row.width.filter(|w| *w > 0.0),
                class: row.car_type.as_deref().and_then(VehicleClass::parse),
            });
        }

        info!(
            "Read {} trajectory rows from '{}' ({} kept, {} unresolved dropped)",
            rows_read,
            path.display(),
            samples.len(),
            unresolved
        );
        Ok(Self::with_stats(samples, rows_read, unresolved))
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn unresolved_dropped(&self) -> u64 {
        self.unresolved_dropped
    }

    /// Node of the vehicle's next differing sample after `index`, if any.
    pub fn next_differing_node(&self, index: usize) -> Option<NodeId> {
        self.next_node[index]
    }

    /// The node the vehicle is about to enter, if the very next sample
    /// already lies in a different node.
    pub fn imminent_transition(&self, index: usize) -> Option<NodeId> {
        if self.imminent[index] {
            self.next_node[index]
        } else {
            None
        }
    }

    /// Minimum and maximum frame over all samples.
    pub fn frame_span(&self) -> Option<(Frame, Frame)> {
        let first = self.samples.first()?;
        let mut span = (first.frame, first.frame);
        for sample in &self.samples {
            span.0 = span.0.min(sample.frame);
            span.1 = span.1.max(sample.frame);
        }
        Some(span)
    }
}
