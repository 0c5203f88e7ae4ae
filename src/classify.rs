//! Final four-tier classification and multi-preset consensus voting.
//!
//! Classification runs exactly once, after the sweep has fixed a single
//! threshold. The "ring of fire" pass is a one-hop expansion from confirmed
//! cores only: trees touching an active cluster are the priority target for
//! preventive treatment before they are infected themselves.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::DetectionConfig;
use crate::hexgrid::{hex_neighbors, NeighborIndex};
use crate::normalize::ScoredReading;

/// Mutually exclusive risk tier of one tree. Exactly one per reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Confirmed member of an active disease cluster.
    Core,
    /// Healthy or borderline tree directly adjacent to a core tree.
    Ring,
    /// Meets the severity threshold without enough corroborating neighbors.
    IsolatedSuspect,
    Healthy,
}

impl RiskTier {
    /// Stable wire tag, as written to the classified table.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Core => "CORE",
            RiskTier::Ring => "RING",
            RiskTier::IsolatedSuspect => "ISOLATED_SUSPECT",
            RiskTier::Healthy => "HEALTHY",
        }
    }

    /// Field-team description. Kept out of the tag itself so the closed
    /// enum stays a pure discriminant.
    pub fn description(&self) -> &'static str {
        match self {
            RiskTier::Core => "confirmed active cluster, sample and sanitize",
            RiskTier::Ring => "adjacent to an active cluster, treat preventively",
            RiskTier::IsolatedSuspect => "flagged without cluster support, re-survey",
            RiskTier::Healthy => "no action",
        }
    }
}

/// A reading with its authoritative tier and prioritization counters.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedReading {
    pub block_id: String,
    pub row: i32,
    pub position: i32,
    pub health_index: f64,
    pub normalized_score: f64,
    pub tier: RiskTier,
    /// Lattice neighbors at or below the neighbor-sickness cutoff.
    pub neighbor_sick_count: usize,
    /// Sick trees within two lattice hops, self excluded. Separates trees
    /// deep inside a density from trees at its edge when ranking work.
    pub cluster_density_score: usize,
}

/// Assign every reading exactly one tier using the chosen threshold.
///
/// Pass 1 flags core suspects (`score <= threshold`) and splits them into
/// `Core` / `IsolatedSuspect` by their sick-neighbor count. Pass 2 expands
/// one hop out of every core: a non-core neighbor becomes `Ring`, whatever
/// it was before. Everything untouched stays `Healthy`.
pub fn classify(
    scored: &[ScoredReading],
    index: &NeighborIndex,
    threshold: f64,
    config: &DetectionConfig,
) -> Vec<ClassifiedReading> {
    let n = scored.len();

    // Sickness under the (looser) neighbor cutoff, shared by both passes
    // and by the density counter.
    let sick: Vec<bool> = scored
        .iter()
        .map(|s| s.normalized_score <= config.neighbor_sickness_cutoff)
        .collect();

    let sick_counts: Vec<usize> = scored
        .iter()
        .map(|s| {
            index
                .neighbors_of(&s.block_id, s.row, s.position)
                .filter(|&j| sick[j])
                .count()
        })
        .collect();

    let mut tiers = vec![RiskTier::Healthy; n];
    for (i, s) in scored.iter().enumerate() {
        if s.normalized_score <= threshold {
            tiers[i] = if sick_counts[i] >= config.min_sick_neighbors {
                RiskTier::Core
            } else {
                RiskTier::IsolatedSuspect
            };
        }
    }

    // Ring of fire: one hop from every core. Never demotes a core.
    for i in 0..n {
        if tiers[i] != RiskTier::Core {
            continue;
        }
        let s = &scored[i];
        for j in index.neighbors_of(&s.block_id, s.row, s.position) {
            if tiers[j] != RiskTier::Core {
                tiers[j] = RiskTier::Ring;
            }
        }
    }

    scored
        .iter()
        .enumerate()
        .map(|(i, s)| ClassifiedReading {
            block_id: s.block_id.clone(),
            row: s.row,
            position: s.position,
            health_index: s.health_index,
            normalized_score: s.normalized_score,
            tier: tiers[i],
            neighbor_sick_count: sick_counts[i],
            cluster_density_score: two_hop_sick_count(scored, index, i, &sick),
        })
        .collect()
}

/// Sick trees within the two-hop hexagonal neighborhood of reading `i`.
fn two_hop_sick_count(
    scored: &[ScoredReading],
    index: &NeighborIndex,
    i: usize,
    sick: &[bool],
) -> usize {
    let s = &scored[i];
    let mut coords: HashSet<(i32, i32)> = HashSet::new();
    for (r1, p1) in hex_neighbors(s.row, s.position) {
        coords.insert((r1, p1));
        for (r2, p2) in hex_neighbors(r1, p1) {
            coords.insert((r2, p2));
        }
    }
    coords.remove(&(s.row, s.position));

    coords
        .into_iter()
        .filter_map(|(r, p)| index.get(&s.block_id, r, p))
        .filter(|&j| sick[j])
        .count()
}

// ---------------------------------------------------------------------------
// Consensus voting across presets
// ---------------------------------------------------------------------------

/// Vote tally over several per-preset classification runs of the same
/// reading sequence.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    /// Per reading: how many runs tagged it `Core`.
    pub votes: Vec<usize>,
    /// Per reading: `votes >= min_votes`.
    pub approved: Vec<bool>,
    pub min_votes: usize,
}

impl ConsensusResult {
    /// Indices of the approved cluster set.
    pub fn approved_indices(&self) -> Vec<usize> {
        self.approved
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| a.then_some(i))
            .collect()
    }
}

/// Count, per tree, how many runs independently tagged it `Core` and apply
/// the `min_votes` promotion rule. Pure aggregation: neighbor counts are
/// not recomputed. All runs must cover the same readings in the same order.
pub fn consensus_votes(runs: &[Vec<ClassifiedReading>], min_votes: usize) -> ConsensusResult {
    let n = runs.first().map_or(0, |r| r.len());
    debug_assert!(runs.iter().all(|r| r.len() == n));

    let votes: Vec<usize> = (0..n)
        .map(|i| runs.iter().filter(|r| r[i].tier == RiskTier::Core).count())
        .collect();
    let approved = votes.iter().map(|&v| v >= min_votes).collect();

    ConsensusResult {
        votes,
        approved,
        min_votes,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectionConfig, ScoreMode};
    use crate::normalize::{normalize, TreeReading};

    fn reading(row: i32, pos: i32, h: f64) -> TreeReading {
        TreeReading {
            block_id: "A".to_string(),
            row,
            position: pos,
            health_index: h,
        }
    }

    fn config(min_sick: usize, cutoff: f64) -> DetectionConfig {
        DetectionConfig {
            neighbor_sickness_cutoff: cutoff,
            min_sick_neighbors: min_sick,
            score_mode: ScoreMode::Percentile,
            ..DetectionConfig::standard()
        }
    }

    /// Percentile-normalized fixture: a 3-tree density at (2,2)/(1,2)/(1,3)
    /// plus scattered healthy trees.
    fn fixture() -> (Vec<ScoredReading>, NeighborIndex) {
        let readings = vec![
            reading(2, 2, 10.0),
            reading(1, 2, 11.0),
            reading(1, 3, 12.0),
            reading(2, 3, 55.0), // touches (2,2) and (1,3) directly
            reading(4, 8, 60.0),
            reading(5, 1, 58.0),
            reading(0, 0, 57.0),
        ];
        let scored = normalize(&readings, ScoreMode::Percentile);
        let index = NeighborIndex::build(
            scored.iter().map(|s| (s.block_id.as_str(), s.row, s.position)),
        );
        (scored, index)
    }

    #[test]
    fn test_every_reading_gets_exactly_one_tier() {
        let (scored, index) = fixture();
        let classified = classify(&scored, &index, 0.35, &config(2, 0.4));
        assert_eq!(classified.len(), scored.len());
        // Union of the four tiers is the whole input, no duplicates: each
        // record carries one tag, so counting tags is enough.
        let total = classified
            .iter()
            .filter(|c| {
                matches!(
                    c.tier,
                    RiskTier::Core | RiskTier::Ring | RiskTier::IsolatedSuspect | RiskTier::Healthy
                )
            })
            .count();
        assert_eq!(total, scored.len());
    }

    #[test]
    fn test_clustered_suspects_become_core() {
        let (scored, index) = fixture();
        // The three sick trees are mutually adjacent: each has 2 sick
        // neighbors under a cutoff that includes all of them.
        let classified = classify(&scored, &index, 0.35, &config(2, 0.4));
        for (r, p) in [(2, 2), (1, 2), (1, 3)] {
            let c = classified
                .iter()
                .find(|c| c.row == r && c.position == p)
                .unwrap();
            assert_eq!(c.tier, RiskTier::Core, "({r},{p}) should be core");
            assert_eq!(c.neighbor_sick_count, 2);
        }
    }

    #[test]
    fn test_ring_overrides_healthy_but_not_core() {
        let (scored, index) = fixture();
        let classified = classify(&scored, &index, 0.35, &config(2, 0.4));

        // (2,3) is adjacent to two of the cores and must be pulled out of
        // HEALTHY into RING.
        let ring = classified
            .iter()
            .find(|c| c.row == 2 && c.position == 3)
            .unwrap();
        assert_eq!(ring.tier, RiskTier::Ring);

        // Cores touch each other yet stay cores.
        assert_eq!(
            classified.iter().filter(|c| c.tier == RiskTier::Core).count(),
            3
        );
        // Trees far from the density are untouched.
        let far = classified
            .iter()
            .find(|c| c.row == 4 && c.position == 8)
            .unwrap();
        assert_eq!(far.tier, RiskTier::Healthy);
    }

    #[test]
    fn test_lone_suspect_is_isolated() {
        // One stressed tree with no sick contacts at all.
        let readings = vec![
            reading(1, 1, 5.0),
            reading(3, 7, 50.0),
            reading(5, 3, 52.0),
            reading(7, 9, 55.0),
        ];
        let scored = normalize(&readings, ScoreMode::Percentile);
        let index = NeighborIndex::build(
            scored.iter().map(|s| (s.block_id.as_str(), s.row, s.position)),
        );
        let classified = classify(&scored, &index, 0.1, &config(2, 0.1));
        assert_eq!(classified[0].tier, RiskTier::IsolatedSuspect);
        assert_eq!(classified[0].neighbor_sick_count, 0);
        assert!(classified[1..]
            .iter()
            .all(|c| c.tier == RiskTier::Healthy));
    }

    #[test]
    fn test_density_score_counts_two_hop_sick() {
        let (scored, index) = fixture();
        let classified = classify(&scored, &index, 0.35, &config(2, 0.4));
        // From (2,3): (2,2) is one hop, (1,2)/(1,3) are within two hops.
        let edge = classified
            .iter()
            .find(|c| c.row == 2 && c.position == 3)
            .unwrap();
        assert_eq!(edge.cluster_density_score, 3);
        // The far healthy tree sees no sickness at all.
        let far = classified
            .iter()
            .find(|c| c.row == 5 && c.position == 1)
            .unwrap();
        assert_eq!(far.cluster_density_score, 0);
    }

    #[test]
    fn test_consensus_min_votes_promotion() {
        let (scored, index) = fixture();
        // Three "presets": two that flag the density, one that flags
        // nothing (threshold below every score).
        let hit = classify(&scored, &index, 0.35, &config(2, 0.4));
        let strict = classify(&scored, &index, 0.35, &config(2, 0.4));
        let miss = classify(&scored, &index, -1.0, &config(2, 0.4));

        let consensus = consensus_votes(&[hit, strict, miss], 2);
        // Exactly the density trees carry 2 votes; everything else 0.
        assert_eq!(consensus.approved_indices(), vec![0, 1, 2]);
        assert_eq!(consensus.votes[0], 2);
        assert_eq!(consensus.votes[3], 0);

        // min_votes = 3 demotes everything.
        let strict_consensus = consensus_votes(
            &[
                classify(&scored, &index, 0.35, &config(2, 0.4)),
                classify(&scored, &index, 0.35, &config(2, 0.4)),
                classify(&scored, &index, -1.0, &config(2, 0.4)),
            ],
            3,
        );
        assert!(strict_consensus.approved_indices().is_empty());
    }

    #[test]
    fn test_consensus_on_empty_runs() {
        let consensus = consensus_votes(&[], 2);
        assert!(consensus.votes.is_empty());
        assert!(consensus.approved_indices().is_empty());
    }
}
