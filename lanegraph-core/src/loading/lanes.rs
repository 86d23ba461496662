//! Lane feature table loading.
//!
//! The geometry itself (shapefile reading, reprojection) is an upstream
//! concern; this loader consumes the flattened per-lane table the upstream
//! step exports: one row per lane with its projected centroid.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::Point;
use log::{info, warn};
use serde::Deserialize;

use crate::Error;
use crate::model::LaneFeature;

#[derive(Debug, Deserialize)]
struct RawLaneRow {
    #[serde(alias = "fid", alias = "FID")]
    lane_id: String,
    #[serde(default, alias = "JOIN_FID")]
    join_fid: Option<String>,
    x: f64,
    y: f64,
    #[serde(alias = "total_length")]
    length: f64,
    #[serde(default)]
    stopline: Option<String>,
}

/// Load lane features from CSV
/// (`lane_id,join_fid,x,y,length[,stopline]`).
pub fn load_lane_features(path: &Path) -> Result<Vec<LaneFeature>, Error> {
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to open file '{}': {}", path.display(), e),
        )
    })?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    for (canonical, accepted) in [
        ("lane_id", &["lane_id", "fid", "FID"][..]),
        ("x", &["x"][..]),
        ("y", &["y"][..]),
        ("length", &["length", "total_length"][..]),
    ] {
        if !headers.iter().any(|h| accepted.contains(&h.trim())) {
            return Err(Error::MissingColumn {
                column: canonical,
                file: path.to_path_buf(),
            });
        }
    }
    if !headers
        .iter()
        .any(|h| ["join_fid", "JOIN_FID"].contains(&h.trim()))
    {
        // Without road grouping every lane is a singleton group: no direct
        // links will be derived from geometry.
        warn!(
            "'{}' has no join_fid column; lanes are treated as independent",
            path.display()
        );
    }

    let mut features = Vec::new();
    for row in reader.deserialize::<RawLaneRow>() {
        let row = row?;
        let lane_id = row
            .lane_id
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|id| id.is_finite() && *id >= 0.0)
            .map(|id| id as u64)
            .ok_or_else(|| Error::InvalidField {
                column: "lane_id",
                file: path.to_path_buf(),
                message: format!("cannot parse `{}` as an id", row.lane_id),
            })?;

        features.push(LaneFeature {
            lane_id,
            join_fid: row
                .join_fid
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            centroid: Point::new(row.x, row.y),
            total_length: row.length,
            stopline: row
                .stopline
                .as_deref()
                .map(str::trim)
                .is_some_and(|s| s == "1" || s.eq_ignore_ascii_case("true")),
        });
    }

    info!(
        "Loaded {} lane features from '{}'",
        features.len(),
        path.display()
    );
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_features_with_optional_columns() {
        let path = std::env::temp_dir().join("lanegraph_lanes_ok.csv");
        std::fs::write(
            &path,
            "lane_id,join_fid,x,y,length,stopline\n\
             1,r12,100.0,200.0,35.0,\n\
             2,,110.0,200.0,30.0,1\n",
        )
        .unwrap();
        let features = load_lane_features(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].join_fid.as_deref(), Some("r12"));
        assert_eq!(features[1].join_fid, None);
        assert!(features[1].stopline);
        assert!(!features[0].stopline);
    }

    #[test]
    fn missing_length_column_is_fatal() {
        let path = std::env::temp_dir().join("lanegraph_lanes_bad.csv");
        std::fs::write(&path, "lane_id,x,y\n1,0.0,0.0\n").unwrap();
        let err = load_lane_features(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            err,
            Error::MissingColumn {
                column: "length",
                ..
            }
        ));
    }

    #[test]
    fn unparsable_lane_id_is_fatal() {
        let path = std::env::temp_dir().join("lanegraph_lanes_badid.csv");
        std::fs::write(&path, "lane_id,x,y,length\nabc,0.0,0.0,10.0\n").unwrap();
        let err = load_lane_features(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            err,
            Error::InvalidField {
                column: "lane_id",
                ..
            }
        ));
    }
}
