// Monte-Carlo scoring engine: per-spread fan-out over volatility inputs
// and stochastic models, tail-risk statistics, liquidity

pub mod score;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::config::EngineConfig;
use crate::math::rng::RngPool;
use crate::models::{CalibratedModels, ParamsSnapshot, StochasticModel};
use crate::spreads::OptionSpread;
use crate::volatility::{VolSurface, WindowedVols};

/// One named volatility input feeding a row of simulation cells.
#[derive(Debug, Clone)]
pub struct VolInput {
    pub name: String,
    pub sigma: f64,
}

/// Per-cell win probabilities keyed "<vol>_<model>", plus the set of
/// cells that degraded (non-finite simulation output).
#[derive(Debug, Clone, Default)]
pub struct ProbabilityResult {
    cells: BTreeMap<String, f64>,
    degraded: BTreeSet<String>,
}

impl ProbabilityResult {
    pub fn insert(&mut self, key: String, probability: f64) {
        self.cells.insert(key, probability.clamp(0.0, 1.0));
    }

    pub fn insert_degraded(&mut self, key: String) {
        self.cells.insert(key.clone(), 0.0);
        self.degraded.insert(key);
    }

    pub fn cells(&self) -> &BTreeMap<String, f64> {
        &self.cells
    }

    pub fn is_degraded(&self, key: &str) -> bool {
        self.degraded.contains(key)
    }

    pub fn degraded_count(&self) -> usize {
        self.degraded.len()
    }

    pub fn all_degraded(&self) -> bool {
        !self.cells.is_empty() && self.degraded.len() == self.cells.len()
    }

    /// Unweighted mean over all cells.
    pub fn average(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.cells.values().sum::<f64>() / self.cells.len() as f64
    }
}

/// A spread with its full scoring output. Immutable once produced; the
/// composite score is assigned by the two-pass ranking stage.
#[derive(Debug, Clone)]
pub struct ScoredSpread {
    pub spread: OptionSpread,
    pub probability: ProbabilityResult,
    /// 5% quantile of path PnL, clamped to ≤ 0 (a loss, or no loss).
    pub var95: f64,
    /// 1% quantile of path PnL, clamped to ≤ 0.
    pub var99: f64,
    /// Mean PnL at or below the VaR95 threshold, clamped to ≤ 0.
    pub expected_shortfall: f64,
    /// Mean relative bid-ask spread across the legs.
    pub liquidity: f64,
    /// Combined leg volume.
    pub volume: i64,
    /// Population-normalized composite; 0 until ranking runs.
    pub composite_score: f64,
    pub model_params: Vec<ParamsSnapshot>,
}

/// Read-only inputs shared by all scoring workers.
pub struct McEngine<'a> {
    pub config: &'a EngineConfig,
    pub models: Vec<StochasticModel>,
    pub snapshots: Vec<ParamsSnapshot>,
    pub surface: &'a VolSurface,
    pub yang_zhang: &'a WindowedVols,
    pub rogers_satchell: &'a WindowedVols,
    pub rng_pool: &'a RngPool,
    pub spot: f64,
    pub rate: f64,
}

impl<'a> McEngine<'a> {
    pub fn new(
        config: &'a EngineConfig,
        calibrated: &CalibratedModels,
        surface: &'a VolSurface,
        yang_zhang: &'a WindowedVols,
        rogers_satchell: &'a WindowedVols,
        rng_pool: &'a RngPool,
        spot: f64,
        rate: f64,
    ) -> Self {
        McEngine {
            config,
            models: calibrated.simulation_set(config.jump_scale_sweep),
            snapshots: calibrated.snapshots(),
            surface,
            yang_zhang,
            rogers_satchell,
            rng_pool,
            spot,
            rate,
        }
    }

    /// The volatility inputs for one spread: surface lookups for both
    /// legs, the six quoted leg IVs, every historical-estimator window,
    /// their averages, the surface average, a combined forward IV, and
    /// the average of everything preceding. Non-finite or non-positive
    /// candidates are dropped.
    pub fn collect_vol_inputs(&self, spread: &OptionSpread) -> Vec<VolInput> {
        let tau = spread.days_to_expiration as f64 / 365.0;
        let mut inputs: Vec<VolInput> = Vec::new();
        let push = |inputs: &mut Vec<VolInput>, name: String, sigma: f64| {
            if sigma.is_finite() && sigma > 0.0 {
                inputs.push(VolInput { name, sigma });
            }
        };

        let short = &spread.short.contract;
        let long = &spread.long.contract;

        push(
            &mut inputs,
            "short_leg_surface".into(),
            self.surface.interpolate(short.strike, tau),
        );
        push(
            &mut inputs,
            "long_leg_surface".into(),
            self.surface.interpolate(long.strike, tau),
        );

        push(&mut inputs, "short_bid_iv".into(), short.greeks.bid_iv);
        push(&mut inputs, "short_mid_iv".into(), short.greeks.mid_iv);
        push(&mut inputs, "short_ask_iv".into(), short.greeks.ask_iv);
        push(&mut inputs, "long_bid_iv".into(), long.greeks.bid_iv);
        push(&mut inputs, "long_mid_iv".into(), long.greeks.mid_iv);
        push(&mut inputs, "long_ask_iv".into(), long.greeks.ask_iv);

        for (&window, &vol) in self.yang_zhang.iter() {
            push(&mut inputs, format!("yang_zhang_{}", window), vol);
        }
        for (&window, &vol) in self.rogers_satchell.iter() {
            push(&mut inputs, format!("rogers_satchell_{}", window), vol);
        }
        if !self.yang_zhang.is_empty() {
            let avg =
                self.yang_zhang.values().sum::<f64>() / self.yang_zhang.len() as f64;
            push(&mut inputs, "yang_zhang_avg".into(), avg);
        }
        if !self.rogers_satchell.is_empty() {
            let avg = self.rogers_satchell.values().sum::<f64>()
                / self.rogers_satchell.len() as f64;
            push(&mut inputs, "rogers_satchell_avg".into(), avg);
        }

        push(&mut inputs, "surface_avg".into(), self.surface.mean_iv());

        // Root-mean-square of the leg mid IVs: the total variance both
        // legs see over the shared horizon
        let (s_iv, l_iv) = (short.greeks.mid_iv, long.greeks.mid_iv);
        if s_iv > 0.0 && l_iv > 0.0 {
            push(
                &mut inputs,
                "combined_forward_iv".into(),
                ((s_iv * s_iv + l_iv * l_iv) / 2.0).sqrt(),
            );
        }

        if !inputs.is_empty() {
            let avg = inputs.iter().map(|v| v.sigma).sum::<f64>() / inputs.len() as f64;
            push(&mut inputs, "complete_avg".into(), avg);
        }

        inputs
    }

    /// Score one spread: run every (vol, model) cell, aggregate the
    /// probability map and the tail statistics of the pooled terminal
    /// prices. Returns None when every cell degraded (or no usable vol
    /// input exists), which drops the spread.
    pub fn evaluate(&self, spread: &OptionSpread) -> Option<ScoredSpread> {
        // Calendar tau prices discounting and surface lookups; the
        // simulation itself takes one step per day to expiration at
        // 1/steps_per_year each, i.e. daily granularity
        let tau = spread.days_to_expiration as f64 / 365.0;
        if tau <= 0.0 {
            return None;
        }
        let steps = (spread.days_to_expiration as usize).max(1);
        let sim_tau = steps as f64 / self.config.steps_per_year as f64;
        let n = self.config.simulations_per_cell;
        let short_strike = spread.short.contract.strike;

        let vol_inputs = self.collect_vol_inputs(spread);
        if vol_inputs.is_empty() {
            debug!("spread has no usable volatility inputs, dropping");
            return None;
        }

        let mut probability = ProbabilityResult::default();
        let mut terminals: Vec<f64> = Vec::with_capacity(n * vol_inputs.len());

        for vol in &vol_inputs {
            for model in &self.models {
                let key = format!("{}_{}", vol.name, model.name());
                let cell_model = model.with_cell_vol(vol.sigma);

                let mut borrowed = self.rng_pool.acquire();
                let rng = borrowed.rng();

                let mut profitable = 0usize;
                let mut degraded = false;
                let mut cell_terminals = Vec::with_capacity(n);
                for _ in 0..n {
                    let terminal = cell_model
                        .simulate_terminal(self.spot, self.rate, sim_tau, steps, vol.sigma, rng);
                    if !terminal.is_finite() || terminal <= 0.0 {
                        degraded = true;
                        break;
                    }
                    if spread.kind.is_profitable(terminal, short_strike) {
                        profitable += 1;
                    }
                    cell_terminals.push(terminal);
                }

                if degraded {
                    warn!("degraded cell {}", key);
                    probability.insert_degraded(key);
                } else {
                    probability.insert(key, profitable as f64 / n as f64);
                    terminals.append(&mut cell_terminals);
                }
            }
        }

        if probability.all_degraded() || terminals.is_empty() {
            warn!("all cells degraded, dropping spread");
            return None;
        }

        let (var95, var99, expected_shortfall) = tail_stats(spread, &terminals);

        Some(ScoredSpread {
            probability,
            var95,
            var99,
            expected_shortfall,
            liquidity: spread.liquidity(),
            volume: spread.total_volume(),
            composite_score: 0.0,
            model_params: self.snapshots.clone(),
            spread: spread.clone(),
        })
    }
}

/// VaR and Expected Shortfall of the spread's PnL over the pooled
/// terminal prices. Losses are negative; a quantile that lands in profit
/// clamps to zero (no loss at that confidence).
fn tail_stats(spread: &OptionSpread, terminals: &[f64]) -> (f64, f64, f64) {
    let mut pnls: Vec<f64> = terminals.iter().map(|&t| spread.path_pnl(t)).collect();
    pnls.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let quantile = |alpha_tail: f64| -> f64 {
        let idx = ((pnls.len() - 1) as f64 * alpha_tail).floor() as usize;
        pnls[idx.min(pnls.len() - 1)]
    };

    let q05 = quantile(0.05);
    let q01 = quantile(0.01);

    let tail: Vec<f64> = pnls.iter().copied().filter(|&p| p <= q05).collect();
    let es = if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };

    (q05.min(0.0), q01.min(0.0), es.min(0.0))
}
