//! Detection configuration: sweep bounds, neighbor rule, elbow policy.
//!
//! Everything is passed by value into the operations that need it; there is
//! no process-wide state. The named presets are nothing more than pre-filled
//! instances, and the core never sees a preset name.

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};

/// How the operating threshold is picked from the sweep table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElbowMethod {
    /// Highest `efficiency_ratio` among candidates with at least
    /// `min_valid_clusters_floor` valid clusters; falls back to the
    /// candidate with the most valid clusters if none reach the floor.
    Efficiency,
    /// Steepest change in `efficiency_ratio` between consecutive steps.
    Gradient,
}

/// How raw health readings are normalized within their block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// `(health_index − mean) / stddev`; 0 for zero-variance blocks.
    ZScore,
    /// Ascending percentile rank in `[0, 1]`, worst reading at 0, ties
    /// share the average rank.
    Percentile,
}

/// Full configuration for one detection run.
///
/// `threshold_scan_*` bound the auto-tune sweep over the normalized-score
/// domain, so sensible values depend on `score_mode` (Z-scores are negative
/// for stressed trees; percentiles live in `[0, 1]`).
///
/// `neighbor_sickness_cutoff` is deliberately a separate, typically looser
/// cutoff than the swept suspect threshold: a borderline tree that would not
/// be flagged on its own still corroborates a sick neighbor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub threshold_scan_min: f64,
    pub threshold_scan_max: f64,
    pub threshold_scan_step: f64,
    /// Normalized-score cutoff used only when counting sick neighbors.
    pub neighbor_sickness_cutoff: f64,
    /// Sick neighbors required to confirm a cluster member (≥ 1).
    pub min_sick_neighbors: usize,
    /// Sweep candidates with fewer valid clusters are ignored by the
    /// efficiency elbow policy.
    pub min_valid_clusters_floor: usize,
    pub elbow_method: ElbowMethod,
    pub score_mode: ScoreMode,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl DetectionConfig {
    /// Balanced Z-score preset.
    pub fn standard() -> Self {
        Self {
            threshold_scan_min: -3.0,
            threshold_scan_max: -1.0,
            threshold_scan_step: 0.1,
            neighbor_sickness_cutoff: -0.75,
            min_sick_neighbors: 2,
            min_valid_clusters_floor: 3,
            elbow_method: ElbowMethod::Efficiency,
            score_mode: ScoreMode::ZScore,
        }
    }

    /// Fewer, higher-confidence cores: deeper scan, stricter neighbor rule.
    pub fn conservative() -> Self {
        Self {
            threshold_scan_min: -3.5,
            threshold_scan_max: -1.5,
            threshold_scan_step: 0.1,
            neighbor_sickness_cutoff: -1.0,
            min_sick_neighbors: 3,
            min_valid_clusters_floor: 2,
            elbow_method: ElbowMethod::Efficiency,
            score_mode: ScoreMode::ZScore,
        }
    }

    /// Earlier warning at the cost of more false positives: shallow scan,
    /// loose neighbor rule, gradient elbow.
    pub fn aggressive() -> Self {
        Self {
            threshold_scan_min: -2.5,
            threshold_scan_max: -0.5,
            threshold_scan_step: 0.25,
            neighbor_sickness_cutoff: -0.5,
            min_sick_neighbors: 2,
            min_valid_clusters_floor: 1,
            elbow_method: ElbowMethod::Gradient,
            score_mode: ScoreMode::ZScore,
        }
    }

    /// Fail fast on a configuration no sweep can run under.
    pub fn validate(&self) -> Result<()> {
        if self.threshold_scan_min > self.threshold_scan_max {
            return Err(DetectError::Configuration(format!(
                "scan range inverted: min {} > max {}",
                self.threshold_scan_min, self.threshold_scan_max
            )));
        }
        if self.threshold_scan_step <= 0.0 {
            return Err(DetectError::Configuration(format!(
                "scan step must be > 0, got {}",
                self.threshold_scan_step
            )));
        }
        if self.min_sick_neighbors == 0 {
            return Err(DetectError::Configuration(
                "min_sick_neighbors must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The inclusive stepped scan range. The step count is fixed up front so
    /// float accumulation cannot drop the endpoint.
    pub(crate) fn scan_thresholds(&self) -> Vec<f64> {
        let span = self.threshold_scan_max - self.threshold_scan_min;
        let steps = (span / self.threshold_scan_step + 1e-9).floor() as usize;
        (0..=steps)
            .map(|k| self.threshold_scan_min + k as f64 * self.threshold_scan_step)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_presets_validate() {
        DetectionConfig::standard().validate().unwrap();
        DetectionConfig::conservative().validate().unwrap();
        DetectionConfig::aggressive().validate().unwrap();
    }

    #[test]
    fn test_inverted_range_rejected() {
        let cfg = DetectionConfig {
            threshold_scan_min: -1.0,
            threshold_scan_max: -2.0,
            ..DetectionConfig::standard()
        };
        assert!(matches!(
            cfg.validate(),
            Err(crate::error::DetectError::Configuration(_))
        ));
    }

    #[test]
    fn test_nonpositive_step_rejected() {
        for step in [0.0, -0.1] {
            let cfg = DetectionConfig {
                threshold_scan_step: step,
                ..DetectionConfig::standard()
            };
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn test_zero_min_sick_neighbors_rejected() {
        let cfg = DetectionConfig {
            min_sick_neighbors: 0,
            ..DetectionConfig::standard()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_scan_range_inclusive_of_endpoint() {
        let cfg = DetectionConfig {
            threshold_scan_min: -3.0,
            threshold_scan_max: -1.0,
            threshold_scan_step: 0.1,
            ..DetectionConfig::standard()
        };
        let ts = cfg.scan_thresholds();
        assert_eq!(ts.len(), 21);
        assert_relative_eq!(ts[0], -3.0);
        assert_relative_eq!(*ts.last().unwrap(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scan_range_single_point() {
        let cfg = DetectionConfig {
            threshold_scan_min: -2.0,
            threshold_scan_max: -2.0,
            threshold_scan_step: 0.5,
            ..DetectionConfig::standard()
        };
        assert_eq!(cfg.scan_thresholds(), vec![-2.0]);
    }
}
