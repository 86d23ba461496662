//! Observed segment-to-segment transition statistics.
//!
//! Transitions are the sole ground-truth evidence of real driving behavior
//! between segments; they validate spatial `near` candidates and reveal
//! `crossing` links that geometry alone cannot.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};

use crate::loading::TrajectoryTable;
use crate::Error;

/// Aggregated `(from, to) -> count` evidence at one granularity level.
///
/// A table holds either lane ids or node ids; callers must not mix levels.
#[derive(Debug, Clone, Default)]
pub struct TransitionCounts {
    counts: HashMap<(u64, u64), u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TransitionRow {
    #[serde(alias = "from_lane_id")]
    from_id: u64,
    #[serde(alias = "to_lane_id")]
    to_id: u64,
    count: u64,
}

impl TransitionCounts {
    pub fn record(&mut self, from: u64, to: u64) {
        *self.counts.entry((from, to)).or_insert(0) += 1;
    }

    pub fn get(&self, from: u64, to: u64) -> u64 {
        self.counts.get(&(from, to)).copied().unwrap_or(0)
    }

    /// Whether at least one real transition between the exact ordered pair
    /// was observed.
    pub fn observed(&self, from: u64, to: u64) -> bool {
        self.get(from, to) > 0
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((u64, u64), u64)> + '_ {
        self.counts.iter().map(|(&pair, &count)| (pair, count))
    }

    /// `(to, count)` tuples grouped by origin.
    pub fn by_origin(&self) -> HashMap<u64, Vec<(u64, u64)>> {
        let mut origins: HashMap<u64, Vec<(u64, u64)>> = HashMap::new();
        for (&(from, to), &count) in &self.counts {
            origins.entry(from).or_default().push((to, count));
        }
        origins
    }

    /// Rows ordered by descending count, ties by ids, for stable output.
    pub fn sorted_rows(&self) -> Vec<(u64, u64, u64)> {
        let mut rows: Vec<(u64, u64, u64)> = self
            .counts
            .iter()
            .map(|(&(from, to), &count)| (from, to, count))
            .collect();
        rows.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        rows
    }

    /// Write the statistics table as `from_id,to_id,count`.
    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        for (from_id, to_id, count) in self.sorted_rows() {
            writer.serialize(TransitionRow {
                from_id,
                to_id,
                count,
            })?;
        }
        writer.flush()?;
        info!(
            "Wrote {} transition rows to '{}'",
            self.counts.len(),
            path.display()
        );
        Ok(())
    }

    /// Read a statistics table, accepting the legacy
    /// `from_lane_id`/`to_lane_id` header names.
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
            ("from_id", &["from_id", "from_lane_id"][..]),
            ("to_id", &["to_id", "to_lane_id"][..]),
            ("count", &["count"][..]),
        ] {
            if !headers.iter().any(|h| accepted.contains(&h.trim())) {
                return Err(Error::MissingColumn {
                    column: canonical,
                    file: path.to_path_buf(),
                });
            }
        }

        let mut counts = TransitionCounts::default();
        for row in reader.deserialize::<TransitionRow>() {
            let row = row?;
            *counts.counts.entry((row.from_id, row.to_id)).or_insert(0) += row.count;
        }
        Ok(counts)
    }
}

/// Extract transition counts from a sorted trajectory table.
///
/// One pass per vehicle in timestamp order: whenever the resolved segment id
/// changes between consecutive samples, one transition is emitted. Degenerate
/// single-sample trajectories emit nothing.
pub fn extract_transitions(table: &TrajectoryTable) -> TransitionCounts {
    let mut counts = TransitionCounts::default();
    let samples = table.samples();
    for pair in samples.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.vehicle_id == curr.vehicle_id && prev.node_id != curr.node_id {
            counts.record(prev.node_id, curr.node_id);
        }
    }
    info!(
        "Extracted {} distinct transition pairs from {} samples",
        counts.len(),
        samples.len()
    );
    counts
}
