//! Resolution of observed transition counts into direct/near/noise.

use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;

use super::TransitionCounts;

/// Strategy for separating genuine connections from tracking noise.
///
/// The maximum-count destination(s) of an origin always become `direct`;
/// ties all become direct (a fork has several primary successors). The
/// variants differ only in where the noise cut falls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifierVariant {
    /// Destinations observed fewer than `min_count` times are noise.
    CountThreshold { min_count: u64 },
    /// The noise cut is the lower quartile of the origin's count
    /// distribution. With one or two destinations the quartile is
    /// meaningless and nothing is discarded.
    LowerQuartile,
}

/// Destinations of one origin, resolved by class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedConnections {
    pub direct: Vec<u64>,
    pub near: Vec<u64>,
}

/// Classify every origin of a transition table.
///
/// Returns the per-origin classes and the number of transitions discarded as
/// noise, which callers must surface for auditability.
pub fn classify(
    counts: &TransitionCounts,
    variant: ClassifierVariant,
) -> (HashMap<u64, ClassifiedConnections>, u64) {
    let mut classified = HashMap::new();
    let mut noise_discarded = 0u64;

    for (from, mut destinations) in counts.by_origin() {
        // Descending count, ties by id for stable output.
        destinations.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let cut = match variant {
            ClassifierVariant::CountThreshold { min_count } => min_count as f64,
            ClassifierVariant::LowerQuartile => {
                if destinations.len() <= 2 {
                    0.0
                } else {
                    lower_quartile(destinations.iter().map(|&(_, count)| count as f64).collect())
                }
            }
        };

        let max_kept = destinations
            .iter()
            .map(|&(_, count)| count)
            .filter(|&count| count as f64 >= cut)
            .max();
        let Some(max_kept) = max_kept else {
            // Every destination fell below the cut.
            noise_discarded += destinations.len() as u64;
            continue;
        };

        let mut classes = ClassifiedConnections::default();
        for (to, count) in destinations {
            if (count as f64) < cut {
                noise_discarded += 1;
            } else if count == max_kept {
                classes.direct.push(to);
            } else {
                classes.near.push(to);
            }
        }
        debug!(
            "Origin {from}: {} direct, {} near (cut {cut})",
            classes.direct.len(),
            classes.near.len()
        );
        classified.insert(from, classes);
    }

    (classified, noise_discarded)
}

/// Linearly interpolated 25th percentile of the given values.
fn lower_quartile(values: Vec<f64>) -> f64 {
    debug_assert!(!values.is_empty());
    let sorted: Vec<f64> = values.into_iter().sorted_by(f64::total_cmp).collect();
    let rank = (sorted.len() - 1) as f64 * 0.25;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
