//! Seed sweeps over one scenario.
//!
//! Plays the same scenario from many seeds in parallel using rayon and
//! collects per-run summaries. Replaying a seed must reproduce its final
//! hash exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tactics_core::unit::Faction;
use tracing::{debug, info, warn};

use crate::protocol::{BatchSummary, Record, RunSummary};
use crate::runner::Session;
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of seeds to run.
    pub runs: u32,
    /// First seed; run `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// AI rounds per run; both sides take a round each time.
    pub rounds: u32,
    /// Maximum parallel runs (0 = use rayon default).
    pub parallel_runs: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            runs: 16,
            seed_start: 0,
            rounds: 5,
            parallel_runs: 0,
        }
    }
}

/// Error during a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Everything a sweep produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Successful runs in seed order.
    pub runs: Vec<RunSummary>,
    /// Failed runs.
    pub errors: Vec<BatchError>,
    /// Totals.
    pub summary: BatchSummary,
    /// Wall time.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// Records for the JSON-lines stream: one per run, then the totals.
    pub fn records(&self) -> Vec<Record> {
        self.runs
            .iter()
            .cloned()
            .map(Record::Run)
            .chain(std::iter::once(Record::Batch(self.summary.clone())))
            .collect()
    }
}

/// Play one seed to the end and summarise it. Hostiles move first each
/// round, then any AI units on the player side.
pub fn run_seed(scenario: &Scenario, seed: u64, rounds: u32) -> Result<RunSummary, ScenarioError> {
    let mut session = Session::new(scenario, seed)?;
    let mut actions: BTreeMap<String, u32> = BTreeMap::new();
    for _ in 0..rounds {
        for faction in [Faction::Hostile, Faction::Player] {
            for record in session.play_round(faction)? {
                if let Record::Decision { action, .. } = record {
                    *actions.entry(action.kind.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
    Ok(RunSummary {
        seed,
        hash: session.state_hash()?,
        actions: actions.into_iter().collect(),
        fallen: session.fallen(),
    })
}

fn summarize(runs: &[RunSummary], failed: u32) -> BatchSummary {
    let mut actions: BTreeMap<String, u32> = BTreeMap::new();
    for run in runs {
        for (kind, count) in &run.actions {
            *actions.entry(kind.clone()).or_insert(0) += count;
        }
    }
    let fallen: u32 = runs.iter().map(|r| r.fallen).sum();
    BatchSummary {
        runs: runs.len() as u32,
        failed,
        distinct_outcomes: runs.iter().map(|r| r.hash).collect::<BTreeSet<_>>().len(),
        actions: actions.into_iter().collect(),
        mean_fallen: if runs.is_empty() {
            0.0
        } else {
            f64::from(fallen) / runs.len() as f64
        },
    }
}

/// Run a sweep.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting sweep: {} runs of '{}' from seed {}",
        config.runs, scenario.name, config.seed_start
    );

    // Configure thread pool if specified
    if config.parallel_runs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<RunSummary, BatchError>> = (0..config.runs)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            run_seed(scenario, seed, config.rounds)
                .map(|run| {
                    debug!("Seed {} finished with hash {:016x}", seed, run.hash);
                    run
                })
                .map_err(|e| {
                    warn!("Seed {} failed: {}", seed, e);
                    BatchError {
                        seed,
                        message: e.to_string(),
                    }
                })
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunSummary> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = summarize(&runs, errors.len() as u32);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Sweep complete: {} runs in {:.1}s, {} distinct outcomes",
        runs.len(),
        duration_seconds,
        summary.distinct_outcomes
    );

    BatchResults {
        config,
        runs,
        errors,
        summary,
        duration_seconds,
    }
}

/// Replay one seed several times and report whether every replay ended
/// on the same hash.
pub fn verify_determinism(scenario: &Scenario, seed: u64, rounds: u32, replays: u32) -> Result<bool, ScenarioError> {
    let hashes = (0..replays)
        .into_par_iter()
        .map(|_| run_seed(scenario, seed, rounds).map(|r| r.hash))
        .collect::<Result<Vec<u64>, ScenarioError>>()?;
    Ok(hashes.windows(2).all(|w| w[0] == w[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BatchConfig {
        BatchConfig {
            runs: 4,
            seed_start: 100,
            rounds: 2,
            parallel_runs: 0,
        }
    }

    #[test]
    fn test_sweep_runs_every_seed_in_order() {
        let results = run_batch(&Scenario::breach(), small());
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.runs.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102, 103]);
        assert_eq!(results.summary.runs, 4);
        assert!(results.summary.distinct_outcomes >= 1);
        assert_eq!(results.records().len(), 5);
    }

    #[test]
    fn test_sweep_matches_serial_runs() {
        let scenario = Scenario::breach();
        let results = run_batch(&scenario, small());
        for run in &results.runs {
            assert_eq!(run, &run_seed(&scenario, run.seed, 2).unwrap());
        }
    }

    #[test]
    fn test_replays_agree() {
        assert!(verify_determinism(&Scenario::patrol(), 9, 3, 3).unwrap());
    }

    #[test]
    fn test_results_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        let results = run_batch(&Scenario::patrol(), small());
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.runs, results.runs);
    }

    #[test]
    fn test_broken_scenario_reports_errors() {
        let mut scenario = Scenario::patrol();
        scenario.placements[0].part = "missing".to_string();
        let results = run_batch(&scenario, small());
        assert!(results.runs.is_empty());
        assert_eq!(results.errors.len(), 4);
        assert_eq!(results.summary.failed, 4);
    }
}
