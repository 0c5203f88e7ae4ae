//! # ganodetect — early Ganoderma outbreak detection for oil-palm estates.
//!
//! Turns a flat table of per-tree vegetation-health readings (drone survey)
//! into a spatially-aware disease-risk map for basal stem rot.
//!
//! Pipeline: block-relative normalization → threshold sweep with automatic
//! elbow selection → hexagonal-lattice cluster classification ("ring of
//! fire") → prioritized intervention list.
//!
//! This crate provides:
//! - **Detection pipeline**: [`normalize()`], [`simulate_thresholds()`],
//!   [`select_threshold()`], [`classify()`], [`detect()`]
//! - **Multi-preset consensus**: [`detect_consensus()`], [`consensus_votes()`]
//! - **Work-list ranking**: [`priority_ranking()`]
//!
//! File ingestion and report rendering live outside the core; the bundled
//! binary is a thin CSV adapter over [`detect`].

pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod hexgrid;
pub mod normalize;
pub mod priority;
pub mod sweep;

pub use classify::{classify, consensus_votes, ClassifiedReading, ConsensusResult, RiskTier};
pub use config::{DetectionConfig, ElbowMethod, ScoreMode};
pub use detect::{detect, detect_consensus, ConsensusOutcome, DetectionResult, DetectionSummary};
pub use error::{DetectError, Result};
pub use hexgrid::{hex_neighbors, NeighborIndex};
pub use normalize::{block_stats, normalize, BlockStats, ScoredReading, TreeReading};
pub use priority::priority_ranking;
pub use sweep::{select_threshold, simulate_thresholds, ThresholdCandidate};
