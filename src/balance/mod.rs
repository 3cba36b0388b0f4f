//! Monte-Carlo rule-table balance simulation.
//!
//! Runs thousands of seeded generations against in-memory scenes to see what
//! a rule table actually produces: level sizes, depth reached, and the share
//! of each room type. Uses rayon for parallel execution across CPU cores;
//! every run owns its generator and scene, so runs never share state.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LevelGenerationSettings;
use crate::constants::DEFAULT_ROOM_SIZE;
use crate::generation::{GenerationOutcome, LevelGenerator, LevelSeed};
use crate::logging::TimingSpan;
use crate::room::RoomLayout;
use crate::rules::RoomType;
use crate::scene::SceneWorld;

/// Configuration for a simulation sweep
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub run_count: u64,
    pub base_seed: u64,
    pub settings: LevelGenerationSettings,
    pub room_size: f32,
    /// Runs still going after this many steps are cancelled
    pub max_steps: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            run_count: 1_000,
            base_seed: 42,
            settings: LevelGenerationSettings::default(),
            room_size: DEFAULT_ROOM_SIZE,
            max_steps: 100_000,
        }
    }
}

/// What one simulated run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub completed: bool,
    pub room_count: usize,
    pub max_depth: u32,
    pub steps: u64,
    pub type_counts: BTreeMap<RoomType, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub total_runs: u64,
    pub completed_runs: u64,
    pub avg_rooms: f32,
    pub std_deviation: f32,
    pub min_rooms: usize,
    pub max_rooms: usize,
    pub avg_max_depth: f32,
    /// Share of every generated room (starting rooms excluded) per type
    pub type_shares: Vec<(String, f32)>,
}

impl BalanceReport {
    pub fn completion_rate(&self) -> f32 {
        if self.total_runs == 0 {
            return 0.0;
        }
        self.completed_runs as f32 / self.total_runs as f32
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Simulate a single seeded run
pub fn simulate_run(config: &SimConfig, seed: u64) -> RunSummary {
    let mut settings = config.settings.clone();
    settings.generator.seed = Some(seed);

    let mut world = SceneWorld::new(RoomLayout::square(config.room_size));
    let mut generator = LevelGenerator::new(settings);

    let mut completed = false;
    if generator.generate_level(&mut world).is_ok() {
        let mut steps = 0;
        while steps < config.max_steps {
            match generator.step(&mut world) {
                Ok(true) => steps += 1,
                Ok(false) | Err(_) => break,
            }
        }
        generator.cancel();
        completed = generator.last_outcome() == Some(&GenerationOutcome::Completed);
    }

    let graph = generator.graph();
    let mut type_counts = graph.type_histogram();
    // The starting room's type comes from config, not from the rules
    if let Some(start) = graph.rooms().first() {
        if let Some(count) = type_counts.get_mut(&start.room_type) {
            *count -= 1;
            if *count == 0 {
                type_counts.remove(&start.room_type);
            }
        }
    }

    RunSummary {
        seed,
        completed,
        room_count: graph.len(),
        max_depth: graph.max_depth(),
        steps: generator.steps(),
        type_counts,
    }
}

/// Run the sweep with rayon parallelism
pub fn run_balance_simulation(config: &SimConfig) -> BalanceReport {
    let _timing = TimingSpan::new("balance_simulation");
    let base = LevelSeed {
        seed: config.base_seed,
    };
    let seeds: Vec<u64> = (0..config.run_count).map(|i| base.run_seed(i)).collect();

    let results: Vec<RunSummary> = seeds
        .par_iter()
        .map(|seed| simulate_run(config, *seed))
        .collect();

    let report = analyze_results(&results);
    info!(
        runs = report.total_runs,
        avg_rooms = report.avg_rooms,
        completion = report.completion_rate(),
        "Balance simulation finished"
    );
    report
}

fn analyze_results(results: &[RunSummary]) -> BalanceReport {
    if results.is_empty() {
        return BalanceReport {
            total_runs: 0,
            completed_runs: 0,
            avg_rooms: 0.0,
            std_deviation: 0.0,
            min_rooms: 0,
            max_rooms: 0,
            avg_max_depth: 0.0,
            type_shares: vec![],
        };
    }

    let n = results.len() as f32;
    let sizes: Vec<f32> = results.iter().map(|r| r.room_count as f32).collect();
    let avg = sizes.iter().sum::<f32>() / n;
    let variance = sizes.iter().map(|s| (s - avg).powi(2)).sum::<f32>() / n;

    let mut totals: BTreeMap<RoomType, usize> = BTreeMap::new();
    for result in results {
        for (room_type, count) in &result.type_counts {
            *totals.entry(*room_type).or_insert(0) += count;
        }
    }
    let generated: usize = totals.values().sum();
    let type_shares = totals
        .iter()
        .map(|(room_type, count)| {
            (
                room_type.label().to_string(),
                *count as f32 / generated.max(1) as f32,
            )
        })
        .collect();

    let incomplete = results.iter().filter(|r| !r.completed).count();
    if incomplete > 0 {
        debug!(incomplete, "Some simulated runs did not complete");
    }

    BalanceReport {
        total_runs: results.len() as u64,
        completed_runs: (results.len() - incomplete) as u64,
        avg_rooms: avg,
        std_deviation: variance.sqrt(),
        min_rooms: results.iter().map(|r| r.room_count).min().unwrap_or(0),
        max_rooms: results.iter().map(|r| r.room_count).max().unwrap_or(0),
        avg_max_depth: results.iter().map(|r| r.max_depth as f32).sum::<f32>() / n,
        type_shares,
    }
}
