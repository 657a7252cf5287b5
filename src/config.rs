// Engine configuration with documented defaults, loadable from JSON

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::math::nelder_mead::NelderMeadConfig;

/// Composite-score weights. They sum to 1; liquidity dominates by design
/// of the scoring rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub probability: f64,
    pub var: f64,
    pub es: f64,
    pub liquidity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            probability: 0.3,
            var: 0.1,
            es: 0.1,
            liquidity: 0.5,
        }
    }
}

/// Tunables of the valuation/simulation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Terminal prices simulated per (vol, model) cell.
    pub simulations_per_cell: usize,
    /// Time-step granularity: steps per simulated year.
    pub steps_per_year: usize,
    /// Nelder-Mead iteration cap for model calibration.
    pub calibration_max_iterations: usize,
    /// Nelder-Mead convergence tolerance.
    pub calibration_tolerance: f64,
    /// Include ×2/×3 jump-intensity variants in the model fan-out.
    pub jump_scale_sweep: bool,
    /// Worker threads per hardware thread.
    pub worker_multiplier: usize,
    /// Hard cap on the worker pool.
    pub max_workers: usize,
    /// Bound of the result channel between workers and the collector.
    pub result_queue_bound: usize,
    /// Fixed RNG seed; None draws one from the system clock.
    pub seed: Option<u64>,
    pub score_weights: ScoreWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            simulations_per_cell: 1000,
            steps_per_year: 252,
            calibration_max_iterations: 1000,
            calibration_tolerance: 1e-6,
            jump_scale_sweep: false,
            worker_multiplier: 2,
            max_workers: 100,
            result_queue_bound: 256,
            seed: None,
            score_weights: ScoreWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Worker count: hardware threads × multiplier, capped.
    pub fn worker_count(&self) -> usize {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (hw * self.worker_multiplier.max(1)).min(self.max_workers).max(1)
    }

    pub fn nelder_mead(&self) -> NelderMeadConfig {
        NelderMeadConfig {
            max_iterations: self.calibration_max_iterations,
            tolerance: self.calibration_tolerance,
            ..Default::default()
        }
    }
}
