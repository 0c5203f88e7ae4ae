//! Threshold sweep and elbow selection.
//!
//! Rather than asking the agronomist for a severity cutoff, the core scans
//! a range of candidate thresholds and measures, at each one, how many of
//! the flagged trees sit in spatially coherent groups. Too strict a cutoff
//! finds almost nothing; too loose a cutoff floods the map with isolated
//! noise. The elbow of that trade-off curve is the operating threshold.

use log::debug;
use serde::Serialize;

use crate::config::{DetectionConfig, ElbowMethod};
use crate::error::{DetectError, Result};
use crate::hexgrid::NeighborIndex;
use crate::normalize::ScoredReading;

/// One candidate from the scan range, with its sweep counters. Ephemeral:
/// the table is only kept for diagnostics once a threshold is chosen.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdCandidate {
    pub threshold: f64,
    /// Readings with `normalized_score <= threshold`.
    pub total_suspects: usize,
    /// Suspects with at least `min_sick_neighbors` sick lattice neighbors.
    pub valid_clusters: usize,
    /// `valid_clusters / total_suspects × 100`; 0 when nothing is flagged.
    pub efficiency_ratio: f64,
}

/// Evaluate a single candidate threshold against the read-only index.
fn evaluate_candidate(
    scored: &[ScoredReading],
    index: &NeighborIndex,
    threshold: f64,
    config: &DetectionConfig,
) -> ThresholdCandidate {
    let mut total_suspects = 0usize;
    let mut valid_clusters = 0usize;

    for s in scored {
        if s.normalized_score > threshold {
            continue;
        }
        total_suspects += 1;
        let sick = index
            .neighbors_of(&s.block_id, s.row, s.position)
            .filter(|&j| scored[j].normalized_score <= config.neighbor_sickness_cutoff)
            .count();
        if sick >= config.min_sick_neighbors {
            valid_clusters += 1;
        }
    }

    let efficiency_ratio = if total_suspects > 0 {
        valid_clusters as f64 / total_suspects as f64 * 100.0
    } else {
        0.0
    };

    ThresholdCandidate {
        threshold,
        total_suspects,
        valid_clusters,
        efficiency_ratio,
    }
}

/// Sweep the configured scan range and return the per-threshold table.
///
/// Every candidate is independent given the scored readings and the index,
/// both of which are only read; with the `threading` feature the candidates
/// are evaluated in parallel and the table is identical either way.
pub fn simulate_thresholds(
    scored: &[ScoredReading],
    index: &NeighborIndex,
    config: &DetectionConfig,
) -> Result<Vec<ThresholdCandidate>> {
    config.validate()?;
    if scored.is_empty() {
        return Err(DetectError::InsufficientData(
            "no readings to sweep".into(),
        ));
    }

    let thresholds = config.scan_thresholds();

    #[cfg(feature = "threading")]
    let candidates: Vec<ThresholdCandidate> = {
        use rayon::prelude::*;
        thresholds
            .par_iter()
            .map(|&t| evaluate_candidate(scored, index, t, config))
            .collect()
    };

    #[cfg(not(feature = "threading"))]
    let candidates: Vec<ThresholdCandidate> = thresholds
        .iter()
        .map(|&t| evaluate_candidate(scored, index, t, config))
        .collect();

    for c in &candidates {
        debug!(
            "threshold {:+.3}: {} suspects, {} in valid clusters ({:.1}%)",
            c.threshold, c.total_suspects, c.valid_clusters, c.efficiency_ratio
        );
    }

    Ok(candidates)
}

/// Pick the operating threshold from a sweep table.
///
/// Ties are broken toward the lowest threshold; the table is in ascending
/// scan order, so "first strictly better wins" does exactly that.
pub fn select_threshold(
    candidates: &[ThresholdCandidate],
    config: &DetectionConfig,
) -> Result<ThresholdCandidate> {
    if candidates.is_empty() {
        return Err(DetectError::InsufficientData(
            "empty sweep table, nothing to select".into(),
        ));
    }

    let chosen = match config.elbow_method {
        ElbowMethod::Efficiency => {
            let floor = config.min_valid_clusters_floor;
            let mut best: Option<&ThresholdCandidate> = None;
            for c in candidates.iter().filter(|c| c.valid_clusters >= floor) {
                if best.map_or(true, |b| c.efficiency_ratio > b.efficiency_ratio) {
                    best = Some(c);
                }
            }
            match best {
                Some(c) => c,
                // Nothing reached the floor: take the candidate that at
                // least found the most clustered suspects.
                None => {
                    let mut fallback = &candidates[0];
                    for c in &candidates[1..] {
                        if c.valid_clusters > fallback.valid_clusters {
                            fallback = c;
                        }
                    }
                    fallback
                }
            }
        }
        ElbowMethod::Gradient => {
            let mut best = &candidates[0];
            let mut best_delta = f64::NEG_INFINITY;
            for w in candidates.windows(2) {
                let delta = (w[1].efficiency_ratio - w[0].efficiency_ratio).abs();
                if delta > best_delta {
                    best_delta = delta;
                    best = &w[1];
                }
            }
            best
        }
    };

    Ok(chosen.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
