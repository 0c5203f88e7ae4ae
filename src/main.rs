//! Ganoderma risk mapping from a drone health-reading table.
//!
//! Usage:
//!   cargo run --release -- readings.csv
//!   cargo run --release -- readings.csv --preset aggressive --json diagnostics.json
//!   cargo run --release -- readings.csv --consensus --min-votes 2
//!
//! Produces:
//!   classified_trees.csv — every tree with score, tier and counters
//!   worklist.csv         — prioritized field intervention list

use std::fs::File;
use std::io::{BufReader, BufWriter};

use clap::Parser;
use csv::{Reader, Writer};

use ganodetect::{
    detect, detect_consensus, priority_ranking, ClassifiedReading, ConsensusResult,
    DetectionConfig, DetectionResult, ElbowMethod, ScoreMode, TreeReading,
};

// ==========================================================================
// Reading the survey table
// ==========================================================================

/// Load one readings CSV: `block_id,row,position,health_index`.
///
/// The core assumes finite health values and well-typed rows, so this
/// boundary enforces both and aborts on the first violation.
fn load_readings(path: &str) -> Vec<TreeReading> {
    let file = File::open(path).unwrap_or_else(|e| {
        eprintln!("Cannot open '{}': {}", path, e);
        std::process::exit(1);
    });
    let mut reader = Reader::from_reader(BufReader::new(file));

    let mut readings: Vec<TreeReading> = Vec::new();
    for (line, record) in reader.deserialize::<TreeReading>().enumerate() {
        let reading = record.unwrap_or_else(|e| {
            eprintln!("Bad row in '{}' (record {}): {}", path, line + 1, e);
            std::process::exit(1);
        });
        if !reading.health_index.is_finite() {
            eprintln!(
                "Bad row in '{}' (record {}): health_index is not finite",
                path,
                line + 1
            );
            std::process::exit(1);
        }
        readings.push(reading);
    }
    readings
}

// ==========================================================================
// CSV / JSON export
// ==========================================================================

fn export_classified(
    classified: &[ClassifiedReading],
    consensus: Option<&ConsensusResult>,
    path: &str,
) {
    let file = File::create(path).unwrap_or_else(|e| {
        eprintln!("Cannot create '{}': {}", path, e);
        std::process::exit(1);
    });
    let mut wtr = Writer::from_writer(BufWriter::new(file));

    let mut header = vec![
        "block_id",
        "row",
        "position",
        "health_index",
        "normalized_score",
        "classification",
        "neighbor_sick_count",
        "cluster_density_score",
    ];
    if consensus.is_some() {
        header.push("core_votes");
        header.push("approved");
    }
    wtr.write_record(&header).unwrap();

    for (i, c) in classified.iter().enumerate() {
        let mut row = vec![
            c.block_id.clone(),
            c.row.to_string(),
            c.position.to_string(),
            format!("{:.2}", c.health_index),
            format!("{:.4}", c.normalized_score),
            c.tier.as_str().to_string(),
            c.neighbor_sick_count.to_string(),
            c.cluster_density_score.to_string(),
        ];
        if let Some(cons) = consensus {
            row.push(cons.votes[i].to_string());
            row.push(cons.approved[i].to_string());
        }
        wtr.write_record(&row).unwrap();
    }

    wtr.flush().unwrap_or_else(|e| {
        eprintln!("CSV flush error: {}", e);
        std::process::exit(1);
    });
}

fn export_worklist(work: &[&ClassifiedReading], path: &str) {
    let file = File::create(path).unwrap_or_else(|e| {
        eprintln!("Cannot create '{}': {}", path, e);
        std::process::exit(1);
    });
    let mut wtr = Writer::from_writer(BufWriter::new(file));

    wtr.write_record([
        "rank",
        "block_id",
        "row",
        "position",
        "classification",
        "cluster_density_score",
        "normalized_score",
        "action",
    ])
    .unwrap();

    for (rank, c) in work.iter().enumerate() {
        wtr.write_record([
            (rank + 1).to_string().as_str(),
            c.block_id.as_str(),
            c.row.to_string().as_str(),
            c.position.to_string().as_str(),
            c.tier.as_str(),
            c.cluster_density_score.to_string().as_str(),
            format!("{:.4}", c.normalized_score).as_str(),
            c.tier.description(),
        ])
        .unwrap();
    }

    wtr.flush().unwrap_or_else(|e| {
        eprintln!("CSV flush error: {}", e);
        std::process::exit(1);
    });
}

fn export_diagnostics(result: &DetectionResult, path: &str) {
    #[derive(serde::Serialize)]
    struct Diagnostics<'a> {
        summary: &'a ganodetect::DetectionSummary,
        sweep: &'a [ganodetect::ThresholdCandidate],
    }
    let file = File::create(path).unwrap_or_else(|e| {
        eprintln!("Cannot create '{}': {}", path, e);
        std::process::exit(1);
    });
    serde_json::to_writer_pretty(
        BufWriter::new(file),
        &Diagnostics {
            summary: &result.summary,
            sweep: &result.sweep,
        },
    )
    .unwrap_or_else(|e| {
        eprintln!("JSON export error: {}", e);
        std::process::exit(1);
    });
}

// ==========================================================================
// CLI (clap)
// ==========================================================================

#[derive(Parser, Debug)]
#[command(
    name = "ganodetect",
    about = "Ganoderma outbreak detection from per-tree drone health readings",
    after_help = "Produces: classified_trees.csv (full map) and worklist.csv (field priorities)"
)]
struct Cli {
    /// Input readings CSV file(s): block_id,row,position,health_index
    #[arg(value_name = "readings.csv", num_args = 1..)]
    csv_paths: Vec<String>,

    /// Base preset: conservative, standard or aggressive
    #[arg(long, default_value = "standard")]
    preset: String,

    /// JSON configuration file (overrides the preset entirely)
    #[arg(long, value_name = "config.json")]
    config: Option<String>,

    /// Scan range lower bound (normalized-score domain)
    #[arg(long)]
    scan_min: Option<f64>,

    /// Scan range upper bound
    #[arg(long)]
    scan_max: Option<f64>,

    /// Scan step
    #[arg(long)]
    scan_step: Option<f64>,

    /// Neighbor-sickness cutoff (looser than the suspect threshold)
    #[arg(long)]
    neighbor_cutoff: Option<f64>,

    /// Sick neighbors required for CORE
    #[arg(long)]
    min_sick_neighbors: Option<usize>,

    /// Minimum valid clusters for the efficiency elbow
    #[arg(long)]
    clusters_floor: Option<usize>,

    /// Elbow policy: efficiency or gradient
    #[arg(long)]
    elbow: Option<String>,

    /// Normalization: zscore or percentile
    #[arg(long)]
    score_mode: Option<String>,

    /// Run all three presets and vote on the cores
    #[arg(long)]
    consensus: bool,

    /// Votes required to approve a core in consensus mode
    #[arg(long, default_value_t = 2)]
    min_votes: usize,

    /// Classified-table output CSV
    #[arg(long, short, default_value = "classified_trees.csv")]
    output: String,

    /// Work-list output CSV
    #[arg(long, default_value = "worklist.csv")]
    worklist: String,

    /// Optional diagnostics dump (summary + sweep table) as JSON
    #[arg(long, value_name = "diagnostics.json")]
    json: Option<String>,
}

fn build_config(cli: &Cli) -> DetectionConfig {
    let mut config = if let Some(path) = &cli.config {
        let file = File::open(path).unwrap_or_else(|e| {
            eprintln!("Cannot open '{}': {}", path, e);
            std::process::exit(1);
        });
        serde_json::from_reader(BufReader::new(file)).unwrap_or_else(|e| {
            eprintln!("Bad configuration in '{}': {}", path, e);
            std::process::exit(1);
        })
    } else {
        preset_by_name(&cli.preset)
    };

    if let Some(v) = cli.scan_min {
        config.threshold_scan_min = v;
    }
    if let Some(v) = cli.scan_max {
        config.threshold_scan_max = v;
    }
    if let Some(v) = cli.scan_step {
        config.threshold_scan_step = v;
    }
    if let Some(v) = cli.neighbor_cutoff {
        config.neighbor_sickness_cutoff = v;
    }
    if let Some(v) = cli.min_sick_neighbors {
        config.min_sick_neighbors = v;
    }
    if let Some(v) = cli.clusters_floor {
        config.min_valid_clusters_floor = v;
    }
    if let Some(elbow) = &cli.elbow {
        config.elbow_method = match elbow.as_str() {
            "efficiency" => ElbowMethod::Efficiency,
            "gradient" => ElbowMethod::Gradient,
            other => {
                eprintln!("Unknown elbow policy '{}' (efficiency | gradient)", other);
                std::process::exit(1);
            }
        };
    }
    if let Some(mode) = &cli.score_mode {
        config.score_mode = match mode.as_str() {
            "zscore" => ScoreMode::ZScore,
            "percentile" => ScoreMode::Percentile,
            other => {
                eprintln!("Unknown score mode '{}' (zscore | percentile)", other);
                std::process::exit(1);
            }
        };
    }
    config
}

fn preset_by_name(name: &str) -> DetectionConfig {
    match name {
        "conservative" => DetectionConfig::conservative(),
        "standard" => DetectionConfig::standard(),
        "aggressive" => DetectionConfig::aggressive(),
        other => {
            eprintln!(
                "Unknown preset '{}' (conservative | standard | aggressive)",
                other
            );
            std::process::exit(1);
        }
    }
}

// ==========================================================================
// Main
// ==========================================================================

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    println!("══════════════════════════════════════════════════════════");
    println!("  ganodetect — Ganoderma risk mapping");
    println!("══════════════════════════════════════════════════════════\n");

    let mut readings: Vec<TreeReading> = Vec::new();
    for path in &cli.csv_paths {
        println!("1. Loading '{}'...", path);
        let batch = load_readings(path);
        println!("   {} readings", batch.len());
        readings.extend(batch);
    }

    let config = build_config(&cli);
    println!("\n2. Parameters:");
    println!(
        "   scan=[{:+.2}, {:+.2}] step={:.2}  neighbor_cutoff={:+.2}",
        config.threshold_scan_min,
        config.threshold_scan_max,
        config.threshold_scan_step,
        config.neighbor_sickness_cutoff
    );
    println!(
        "   min_sick_neighbors={}  clusters_floor={}  elbow={:?}  score={:?}",
        config.min_sick_neighbors,
        config.min_valid_clusters_floor,
        config.elbow_method,
        config.score_mode
    );
    if cli.consensus {
        println!(
            "   consensus: conservative+standard+aggressive, min_votes={}",
            cli.min_votes
        );
    }

    println!("\n3. Detecting...");
    let t0 = std::time::Instant::now();

    let (result, consensus) = if cli.consensus {
        let configs = vec![
            DetectionConfig::conservative(),
            DetectionConfig::standard(),
            DetectionConfig::aggressive(),
        ];
        let reported = match cli.preset.as_str() {
            "conservative" => 0,
            "aggressive" => 2,
            _ => 1,
        };
        let outcome = detect_consensus(&readings, &configs, cli.min_votes).unwrap_or_else(|e| {
            eprintln!("   Detection failed: {}", e);
            std::process::exit(1);
        });
        let result = outcome.runs.into_iter().nth(reported).unwrap();
        (result, Some(outcome.consensus))
    } else {
        let result = detect(&readings, &config).unwrap_or_else(|e| {
            eprintln!("   Detection failed: {}", e);
            std::process::exit(1);
        });
        (result, None)
    };
    let dt = t0.elapsed();
    println!(
        "   ✓ threshold {:+.3} chosen from {} candidates in {:.2}s",
        result.summary.chosen_threshold,
        result.sweep.len(),
        dt.as_secs_f64()
    );

    let work = priority_ranking(&result.readings);

    println!("\n4. Statistics:");
    let s = &result.summary;
    println!(
        "   Tiers       : {} core  {} ring  {} isolated  {} healthy",
        s.core, s.ring, s.isolated_suspect, s.healthy
    );
    if let Some(cons) = &consensus {
        println!(
            "   Consensus   : {} trees approved at >= {} votes",
            cons.approved_indices().len(),
            cons.min_votes
        );
    }
    println!("   Follow-ups  : {} trees on the work list", work.len());

    if !work.is_empty() {
        println!("\n   Top 10 priorities:");
        println!(
            "   {:>4}  {:>8}  {:>4}  {:>4}  {:>18}  {:>7}",
            "#", "block", "row", "pos", "tier", "density"
        );
        println!("   {}", "─".repeat(56));
        for (rank, c) in work.iter().take(10).enumerate() {
            println!(
                "   {:>4}  {:>8}  {:>4}  {:>4}  {:>18}  {:>7}",
                rank + 1,
                c.block_id,
                c.row,
                c.position,
                c.tier.as_str(),
                c.cluster_density_score
            );
        }
    }

    println!("\n5. Export → '{}' and '{}'", cli.output, cli.worklist);
    export_classified(&result.readings, consensus.as_ref(), &cli.output);
    export_worklist(&work, &cli.worklist);
    if let Some(json_path) = &cli.json {
        export_diagnostics(&result, json_path);
        println!("   Diagnostics → '{}'", json_path);
    }

    println!("\n══════════════════════════════════════════════════════════");
    println!(
        "  ✓ Done — {} trees classified, {} follow-ups",
        result.readings.len(),
        work.len()
    );
    println!("══════════════════════════════════════════════════════════");
}
