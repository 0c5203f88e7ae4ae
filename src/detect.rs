//! Top-level detection pipeline.
//!
//! Steps:
//! 1. `normalize` (block-relative scores)
//! 2. `NeighborIndex::build` (once, reused read-only)
//! 3. `simulate_thresholds` + `select_threshold` (auto-tune)
//! 4. `classify` (single authoritative pass at the chosen threshold)
//!
//! The classified table and the sweep table are handed onward to reporting;
//! the core owns no files or sockets of its own.

use log::info;
use serde::Serialize;

use crate::classify::{classify, consensus_votes, ClassifiedReading, ConsensusResult, RiskTier};
use crate::config::DetectionConfig;
use crate::error::{DetectError, Result};
use crate::hexgrid::NeighborIndex;
use crate::normalize::{normalize, TreeReading};
use crate::sweep::{select_threshold, simulate_thresholds, ThresholdCandidate};

/// Per-tier counts plus the threshold the sweep settled on.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummary {
    pub chosen_threshold: f64,
    pub core: usize,
    pub ring: usize,
    pub isolated_suspect: usize,
    pub healthy: usize,
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    /// Input readings, same order, extended with score, tier and counters.
    pub readings: Vec<ClassifiedReading>,
    pub summary: DetectionSummary,
    /// Full sweep table, for diagnostic charting downstream.
    pub sweep: Vec<ThresholdCandidate>,
}

/// Result of running several presets over the same batch and voting.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusOutcome {
    /// One full result per preset, in the order the configs were given.
    pub runs: Vec<DetectionResult>,
    pub consensus: ConsensusResult,
}

/// Run the full detection pipeline over one cleaned batch of readings.
pub fn detect(readings: &[TreeReading], config: &DetectionConfig) -> Result<DetectionResult> {
    config.validate()?;
    if readings.is_empty() {
        return Err(DetectError::InsufficientData(
            "empty batch: nothing to normalize".into(),
        ));
    }

    let scored = normalize(readings, config.score_mode);
    let index = NeighborIndex::build(
        scored
            .iter()
            .map(|s| (s.block_id.as_str(), s.row, s.position)),
    );
    info!(
        "{} readings across {} blocks",
        scored.len(),
        index.block_count()
    );

    let sweep = simulate_thresholds(&scored, &index, config)?;
    let chosen = select_threshold(&sweep, config)?;
    info!(
        "chosen threshold {:+.3} ({} suspects, {} in valid clusters)",
        chosen.threshold, chosen.total_suspects, chosen.valid_clusters
    );

    let classified = classify(&scored, &index, chosen.threshold, config);
    let summary = summarize(&classified, chosen.threshold);
    info!(
        "tiers: {} core / {} ring / {} isolated / {} healthy",
        summary.core, summary.ring, summary.isolated_suspect, summary.healthy
    );

    Ok(DetectionResult {
        readings: classified,
        summary,
        sweep,
    })
}

/// Run `detect` once per configuration and vote on the cores.
///
/// Each run writes its own output collection; the vote is a pure
/// aggregation afterwards, so per-preset results stay available untouched.
pub fn detect_consensus(
    readings: &[TreeReading],
    configs: &[DetectionConfig],
    min_votes: usize,
) -> Result<ConsensusOutcome> {
    let mut runs = Vec::with_capacity(configs.len());
    for config in configs {
        runs.push(detect(readings, config)?);
    }

    let tables: Vec<Vec<ClassifiedReading>> =
        runs.iter().map(|r| r.readings.clone()).collect();
    let consensus = consensus_votes(&tables, min_votes);
    info!(
        "consensus: {} of {} trees approved at >= {} votes",
        consensus.approved_indices().len(),
        readings.len(),
        min_votes
    );

    Ok(ConsensusOutcome { runs, consensus })
}

fn summarize(classified: &[ClassifiedReading], chosen_threshold: f64) -> DetectionSummary {
    let mut summary = DetectionSummary {
        chosen_threshold,
        core: 0,
        ring: 0,
        isolated_suspect: 0,
        healthy: 0,
    };
    for c in classified {
        match c.tier {
            RiskTier::Core => summary.core += 1,
            RiskTier::Ring => summary.ring += 1,
            RiskTier::IsolatedSuspect => summary.isolated_suspect += 1,
            RiskTier::Healthy => summary.healthy += 1,
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
