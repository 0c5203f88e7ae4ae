//! Block-relative normalization of raw vegetation-health readings.
//!
//! A reading only means something relative to its own planting block: soil,
//! palm age and imaging conditions shift whole blocks up or down. Both
//! normalization paths therefore derive their statistics per block and
//! never across the whole estate.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::ScoreMode;

/// One per-tree reading from the drone survey, as delivered by ingestion.
///
/// `(row, position)` is unique within a block and `health_index` is finite;
/// both are enforced upstream before the core ever sees the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeReading {
    pub block_id: String,
    pub row: i32,
    pub position: i32,
    pub health_index: f64,
}

/// Distributional statistics of one block, recomputed fresh every run.
#[derive(Debug, Clone, Serialize)]
pub struct BlockStats {
    pub block_id: String,
    pub mean: f64,
    /// Population standard deviation. 0 for a degenerate block.
    pub stddev: f64,
    pub count: usize,
}

/// A reading annotated with its block-relative normalized score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredReading {
    pub block_id: String,
    pub row: i32,
    pub position: i32,
    pub health_index: f64,
    pub normalized_score: f64,
}

/// Compute `{mean, stddev, count}` for every block, sorted by block id.
pub fn block_stats(readings: &[TreeReading]) -> Vec<BlockStats> {
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in readings {
        groups.entry(r.block_id.as_str()).or_default().push(r.health_index);
    }

    let mut stats: Vec<BlockStats> = groups
        .into_iter()
        .map(|(block_id, values)| {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            BlockStats {
                block_id: block_id.to_string(),
                mean,
                stddev: var.sqrt(),
                count: values.len(),
            }
        })
        .collect();

    stats.sort_by(|a, b| a.block_id.cmp(&b.block_id));
    stats
}

/// Annotate every reading with a normalized score, preserving input order.
///
/// Pure transform: never rejects data. A block whose readings are all
/// identical (stddev 0, or a single tree) carries no anomaly signal, so
/// every score in it is defined as 0 rather than dividing by zero.
pub fn normalize(readings: &[TreeReading], mode: ScoreMode) -> Vec<ScoredReading> {
    let scores = match mode {
        ScoreMode::ZScore => z_scores(readings),
        ScoreMode::Percentile => percentile_scores(readings),
    };

    readings
        .iter()
        .zip(scores)
        .map(|(r, normalized_score)| ScoredReading {
            block_id: r.block_id.clone(),
            row: r.row,
            position: r.position,
            health_index: r.health_index,
            normalized_score,
        })
        .collect()
}

fn z_scores(readings: &[TreeReading]) -> Vec<f64> {
    let stats = block_stats(readings);
    for s in &stats {
        if s.stddev == 0.0 && s.count > 1 {
            warn!(
                "block {} has zero variance across {} readings; scores set to neutral",
                s.block_id, s.count
            );
        }
    }
    let by_block: HashMap<&str, &BlockStats> =
        stats.iter().map(|s| (s.block_id.as_str(), s)).collect();

    readings
        .iter()
        .map(|r| {
            let s = by_block[r.block_id.as_str()];
            if s.stddev == 0.0 {
                0.0
            } else {
                (r.health_index - s.mean) / s.stddev
            }
        })
        .collect()
}

fn percentile_scores(readings: &[TreeReading]) -> Vec<f64> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, r) in readings.iter().enumerate() {
        groups.entry(r.block_id.as_str()).or_default().push(i);
    }

    let mut scores = vec![0.0; readings.len()];
    for (_, mut idxs) in groups {
        idxs.sort_by(|&a, &b| {
            readings[a]
                .health_index
                .partial_cmp(&readings[b].health_index)
                .unwrap_or(Ordering::Equal)
        });
        let n = idxs.len();
        if n <= 1 {
            continue; // single tree: rank carries no signal, score stays 0
        }
        // Degenerate block: identical readings rank nowhere in particular,
        // so the whole block is scored neutral, same as the Z-score path.
        if readings[idxs[0]].health_index == readings[idxs[n - 1]].health_index {
            warn!(
                "block {} has zero spread across {} readings; scores set to neutral",
                readings[idxs[0]].block_id, n
            );
            continue;
        }

        // Walk runs of equal values; every member of a run gets the average
        // of the 0-based ranks the run spans.
        let mut i = 0;
        while i < n {
            let mut j = i;
            while j + 1 < n
                && readings[idxs[j + 1]].health_index == readings[idxs[i]].health_index
            {
                j += 1;
            }
            let avg_rank = (i + j) as f64 / 2.0;
            for k in i..=j {
                scores[idxs[k]] = avg_rank / (n - 1) as f64;
            }
            i = j + 1;
        }
    }

    scores
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reading(block: &str, row: i32, pos: i32, h: f64) -> TreeReading {
        TreeReading {
            block_id: block.to_string(),
            row,
            position: pos,
            health_index: h,
        }
    }

    #[test]
    fn test_block_stats_grouping() {
        let readings = vec![
            reading("B2", 1, 1, 10.0),
            reading("B1", 1, 1, 4.0),
            reading("B1", 1, 2, 8.0),
        ];
        let stats = block_stats(&readings);
        assert_eq!(stats.len(), 2);
        // Sorted by block id.
        assert_eq!(stats[0].block_id, "B1");
        assert_eq!(stats[0].count, 2);
        assert_relative_eq!(stats[0].mean, 6.0);
        assert_relative_eq!(stats[0].stddev, 2.0);
        assert_eq!(stats[1].block_id, "B2");
        assert_eq!(stats[1].count, 1);
        assert_relative_eq!(stats[1].stddev, 0.0);
    }

    #[test]
    fn test_z_scores_relative_to_own_block() {
        let readings = vec![
            reading("A", 1, 1, 4.0),
            reading("A", 1, 2, 8.0),
            // Same raw values in a block with a different spread.
            reading("B", 1, 1, 4.0),
            reading("B", 1, 2, 8.0),
            reading("B", 1, 3, 6.0),
        ];
        let scored = normalize(&readings, ScoreMode::ZScore);
        assert_relative_eq!(scored[0].normalized_score, -1.0);
        assert_relative_eq!(scored[1].normalized_score, 1.0);
        // Block B: mean 6, population stddev sqrt(8/3).
        let sd = (8.0f64 / 3.0).sqrt();
        assert_relative_eq!(scored[2].normalized_score, -2.0 / sd);
        assert_relative_eq!(scored[4].normalized_score, 0.0);
    }

    #[test]
    fn test_degenerate_block_scores_zero() {
        // All readings identical: no anomaly signal, every score must be 0
        // regardless of the raw value.
        let readings: Vec<TreeReading> = (0..5)
            .map(|p| reading("A", 1, p, 77.7))
            .collect();
        for mode in [ScoreMode::ZScore, ScoreMode::Percentile] {
            let scored = normalize(&readings, mode);
            assert!(scored.iter().all(|s| s.normalized_score == 0.0));
        }
    }

    #[test]
    fn test_single_reading_block_scores_zero() {
        let readings = vec![reading("A", 1, 1, 42.0)];
        for mode in [ScoreMode::ZScore, ScoreMode::Percentile] {
            let scored = normalize(&readings, mode);
            assert_eq!(scored[0].normalized_score, 0.0);
        }
    }

    #[test]
    fn test_percentile_worst_is_zero_best_is_one() {
        let readings = vec![
            reading("A", 1, 1, 30.0),
            reading("A", 1, 2, 10.0),
            reading("A", 1, 3, 20.0),
        ];
        let scored = normalize(&readings, ScoreMode::Percentile);
        assert_relative_eq!(scored[1].normalized_score, 0.0);
        assert_relative_eq!(scored[2].normalized_score, 0.5);
        assert_relative_eq!(scored[0].normalized_score, 1.0);
    }

    #[test]
    fn test_percentile_ties_share_average_rank() {
        let readings = vec![
            reading("A", 1, 1, 10.0),
            reading("A", 1, 2, 10.0),
            reading("A", 1, 3, 50.0),
        ];
        let scored = normalize(&readings, ScoreMode::Percentile);
        // The two tied worst readings span ranks 0 and 1: average 0.5,
        // scaled by n-1 = 2.
        assert_relative_eq!(scored[0].normalized_score, 0.25);
        assert_relative_eq!(scored[1].normalized_score, 0.25);
        assert_relative_eq!(scored[2].normalized_score, 1.0);
    }

    #[test]
    fn test_normalize_preserves_input_order() {
        let readings = vec![
            reading("B", 2, 1, 5.0),
            reading("A", 1, 1, 9.0),
            reading("B", 2, 2, 7.0),
        ];
        let scored = normalize(&readings, ScoreMode::ZScore);
        let coords: Vec<(&str, i32, i32)> = scored
            .iter()
            .map(|s| (s.block_id.as_str(), s.row, s.position))
            .collect();
        assert_eq!(coords, vec![("B", 2, 1), ("A", 1, 1), ("B", 2, 2)]);
    }
}
