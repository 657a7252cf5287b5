// Pipeline driver: calibrate once, enumerate, fan out scoring workers,
// rank, truncate

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use log::{info, warn};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::engine::{score, McEngine, ScoredSpread};
use crate::error::EngineError;
use crate::market::{OptionChain, QuoteHistory};
use crate::math::nelder_mead::NelderMeadConfig;
use crate::math::rng::RngPool;
use crate::models::cgmy::CgmyModel;
use crate::models::heston::{HestonModel, HestonParams};
use crate::models::kou::KouModel;
use crate::models::merton::MertonModel;
use crate::models::{CalibratedModels, CalibrationQuote};
use crate::spreads::{enumerate_spreads, EnumerationParams, SpreadKind};
use crate::volatility::{estimate_windows, Estimator, VolSurface};

/// Caller-facing knobs for one discovery run.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryParams {
    pub min_dte: i64,
    pub max_dte: i64,
    /// Quoted return-on-risk floor, 0 < min_ror < 1.
    pub min_ror: f64,
    /// Annualized risk-free rate.
    pub risk_free_rate: f64,
    /// Positive selects bull puts, anything else bear calls.
    pub indicator: i32,
    /// Ranking truncation.
    pub top_k: usize,
}

impl DiscoveryParams {
    pub fn kind(&self) -> SpreadKind {
        if self.indicator > 0 {
            SpreadKind::BullPut
        } else {
            SpreadKind::BearCall
        }
    }
}

/// Cooperative cancellation: an external signal plus an optional
/// wall-clock budget. Workers poll between cells, drain, and the run
/// returns whatever was scored.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + budget),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// Run the full discovery pipeline for one symbol. Pure over its inputs:
/// history and chain are consumed read-only, nothing persists.
///
/// Sequential prologue (estimators, calibrations, surface), then a
/// fixed-size worker pool scores candidates and streams results through a
/// bounded channel. Returns the ranked top-K; `Cancelled` only when the
/// run was cut short before producing anything.
#[allow(clippy::too_many_arguments)]
pub fn discover(
    symbol: &str,
    history: &QuoteHistory,
    chain: &OptionChain,
    spot: f64,
    today: NaiveDate,
    params: &DiscoveryParams,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<Vec<ScoredSpread>, EngineError> {
    validate_inputs(symbol, spot, params)?;

    if chain.is_empty() {
        info!("{}: empty chain, nothing to rank", symbol);
        return Ok(Vec::new());
    }
    if params.min_ror >= 1.0 {
        return Ok(Vec::new());
    }

    // Sequential prologue: cheap relative to the Monte-Carlo fan-out
    let yang_zhang = estimate_windows(history, Estimator::YangZhang);
    let rogers_satchell = estimate_windows(history, Estimator::RogersSatchell);
    let surface = VolSurface::build(chain, today);
    let calibrated = calibrate_models(
        history,
        chain,
        spot,
        today,
        params,
        config.nelder_mead(),
    );

    let enumeration = EnumerationParams {
        min_dte: params.min_dte,
        max_dte: params.max_dte,
        min_ror: params.min_ror,
        risk_free_rate: params.risk_free_rate,
    };
    let candidates = enumerate_spreads(chain, params.kind(), spot, today, &enumeration);
    info!(
        "{}: {} {} candidates after prefilter",
        symbol,
        candidates.len(),
        params.kind().name()
    );
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let workers = config.worker_count();
    let rng_pool = match config.seed {
        Some(seed) => RngPool::with_seed(workers, seed),
        None => RngPool::from_entropy(workers),
    };
    let engine = McEngine::new(
        config,
        &calibrated,
        &surface,
        &yang_zhang,
        &rogers_satchell,
        &rng_pool,
        spot,
        params.risk_free_rate,
    );

    let scored = run_workers(&engine, &candidates, workers, config, cancel)?;

    let mut ranked = score::rank(scored, &config.score_weights);
    ranked.truncate(params.top_k);
    info!("{}: ranked {} spreads", symbol, ranked.len());
    Ok(ranked)
}

/// Fan candidates over a fixed-size rayon pool. Results flow through a
/// bounded channel into a collector thread; a saturated channel retries
/// briefly and then skips the result rather than blocking forever.
fn run_workers(
    engine: &McEngine<'_>,
    candidates: &[crate::spreads::OptionSpread],
    workers: usize,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<Vec<ScoredSpread>, EngineError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| EngineError::InputInvalid(format!("worker pool: {}", e)))?;

    let (tx, rx) = mpsc::sync_channel::<ScoredSpread>(config.result_queue_bound);
    let collector = std::thread::spawn(move || {
        let mut collected = Vec::new();
        while let Ok(result) = rx.recv() {
            collected.push(result);
        }
        collected
    });

    pool.install(|| {
        candidates.par_iter().for_each_with(tx, |tx, candidate| {
            if cancel.is_cancelled() {
                return;
            }
            let Some(result) = engine.evaluate(candidate) else {
                return;
            };
            // One brief retry on saturation, then drop the result
            match tx.try_send(result) {
                Ok(()) => {}
                Err(TrySendError::Full(result)) => {
                    std::thread::sleep(Duration::from_millis(10));
                    if tx.try_send(result).is_err() {
                        warn!("result channel saturated, skipping a scored spread");
                    }
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        });
    });

    let collected = collector
        .join()
        .map_err(|_| EngineError::InputInvalid("result collector panicked".into()))?;

    if collected.is_empty() && cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(collected)
}

fn validate_inputs(symbol: &str, spot: f64, params: &DiscoveryParams) -> Result<(), EngineError> {
    if symbol.is_empty() || !symbol.is_ascii() {
        return Err(EngineError::InputInvalid(format!(
            "symbol must be non-empty ASCII, got {:?}",
            symbol
        )));
    }
    if spot <= 0.0 || !spot.is_finite() {
        return Err(EngineError::InputInvalid(format!(
            "spot must be positive, got {}",
            spot
        )));
    }
    if params.min_ror <= 0.0 {
        return Err(EngineError::InputInvalid(
            "min_ror must be positive".into(),
        ));
    }
    if params.min_dte > params.max_dte {
        return Err(EngineError::InputInvalid(format!(
            "min_dte {} exceeds max_dte {}",
            params.min_dte, params.max_dte
        )));
    }
    Ok(())
}

/// Global calibrations, one per model family. Every failure path inside
/// the individual calibrators recovers to documented fallbacks and flags
/// the snapshot; nothing here is fatal.
fn calibrate_models(
    history: &QuoteHistory,
    chain: &OptionChain,
    spot: f64,
    today: NaiveDate,
    params: &DiscoveryParams,
    nm: NelderMeadConfig,
) -> CalibratedModels {
    let returns = history.log_returns();
    let gaps = history.overnight_gaps();

    let quotes = calibration_quotes(chain, today, params);
    let seed = heston_seed(&returns);
    let heston = HestonModel::calibrate(spot, params.risk_free_rate, &quotes, seed, nm.clone());
    let merton = MertonModel::calibrate(&gaps, &returns);
    let kou = KouModel::calibrate(&returns);
    let cgmy = CgmyModel::calibrate(&returns, nm);

    CalibratedModels {
        heston,
        merton,
        kou,
        cgmy,
    }
}

/// Calibration targets: liquid mids inside the DTE window, both rights.
fn calibration_quotes(
    chain: &OptionChain,
    today: NaiveDate,
    params: &DiscoveryParams,
) -> Vec<CalibrationQuote> {
    let mut quotes = Vec::new();
    for expiration in chain.expirations_within(today, params.min_dte, params.max_dte) {
        let tau = (expiration - today).num_days() as f64 / 365.0;
        if tau <= 0.0 {
            continue;
        }
        for contract in chain.contracts(expiration) {
            let mid = contract.mid_price();
            if mid > 0.0 && contract.bid > 0.0 {
                quotes.push(CalibrationQuote {
                    strike: contract.strike,
                    tau,
                    mid,
                    right: contract.right,
                });
            }
        }
    }
    quotes
}

/// Seed Heston from realized variance: V0 = θ = annualized close-close
/// variance, the rest from the documented defaults.
fn heston_seed(returns: &[f64]) -> HestonParams {
    let fallback = HestonParams::fallback();
    if returns.len() < 21 {
        return fallback;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0) * 252.0;
    if !(variance.is_finite() && variance > 0.0) {
        return fallback;
    }
    HestonParams {
        v0: variance,
        theta: variance,
        ..fallback
    }
}
