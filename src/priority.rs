//! Field work list: which trees to visit first.

use std::cmp::Ordering;

use crate::classify::{ClassifiedReading, RiskTier};

/// Follow-up order of a tier; `None` means no field visit is required.
fn follow_up_rank(tier: RiskTier) -> Option<u8> {
    match tier {
        RiskTier::Core => Some(0),
        RiskTier::IsolatedSuspect => Some(1),
        RiskTier::Ring | RiskTier::Healthy => None,
    }
}

/// Order the trees requiring follow-up into a work list.
///
/// Cores first, then isolated suspects; within a tier, denser surroundings
/// first. The final coordinate key makes the ordering fully deterministic,
/// so re-running over the same classification restarts the same sequence.
pub fn priority_ranking(classified: &[ClassifiedReading]) -> Vec<&ClassifiedReading> {
    let mut work: Vec<&ClassifiedReading> = classified
        .iter()
        .filter(|c| follow_up_rank(c.tier).is_some())
        .collect();

    work.sort_by(|a, b| {
        follow_up_rank(a.tier)
            .cmp(&follow_up_rank(b.tier))
            .then_with(|| b.cluster_density_score.cmp(&a.cluster_density_score))
            .then_with(|| {
                (a.block_id.as_str(), a.row, a.position)
                    .partial_cmp(&(b.block_id.as_str(), b.row, b.position))
                    .unwrap_or(Ordering::Equal)
            })
    });

    work
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
