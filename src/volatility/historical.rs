// Historical volatility estimators on OHLC windows
// Yang-Zhang, Rogers-Satchell, Parkinson, Garman-Klass, annualized by √252

use std::collections::BTreeMap;

use crate::market::{DailyBar, QuoteHistory};

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Canonical lookback windows, filtered to what the history can support.
pub const CANONICAL_WINDOWS: [usize; 9] = [5, 10, 21, 63, 126, 252, 756, 1260, 2520];

/// Window (trading days) → annualized volatility.
pub type WindowedVols = BTreeMap<usize, f64>;

/// Estimator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    YangZhang,
    RogersSatchell,
    Parkinson,
    GarmanKlass,
}

impl Estimator {
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::YangZhang => "yang_zhang",
            Estimator::RogersSatchell => "rogers_satchell",
            Estimator::Parkinson => "parkinson",
            Estimator::GarmanKlass => "garman_klass",
        }
    }
}

/// Run one estimator over every canonical window the history supports.
pub fn estimate_windows(history: &QuoteHistory, estimator: Estimator) -> WindowedVols {
    let mut out = WindowedVols::new();
    for &window in &CANONICAL_WINDOWS {
        if let Some(vol) = estimate(history, estimator, window) {
            out.insert(window, vol);
        }
    }
    out
}

/// Annualized volatility over the trailing `window` bars, or None when the
/// history is too short (Yang-Zhang needs one extra bar for the prior
/// close) or the estimate degenerates.
pub fn estimate(history: &QuoteHistory, estimator: Estimator, window: usize) -> Option<f64> {
    let bars = history.bars();
    let needed = match estimator {
        Estimator::YangZhang => window + 1,
        _ => window,
    };
    if window < 2 || bars.len() < needed {
        return None;
    }
    let tail = &bars[bars.len() - needed..];

    let variance = match estimator {
        Estimator::YangZhang => yang_zhang_variance(tail),
        Estimator::RogersSatchell => rogers_satchell_variance(tail),
        Estimator::Parkinson => parkinson_variance(tail),
        Estimator::GarmanKlass => garman_klass_variance(tail),
    }?;

    let annualized = (variance * TRADING_DAYS).sqrt();
    annualized.is_finite().then_some(annualized)
}

/// Rogers-Satchell per-day variance: mean of
/// ln(H/C)·ln(H/O) + ln(L/C)·ln(L/O). Drift-independent.
fn rogers_satchell_variance(bars: &[DailyBar]) -> Option<f64> {
    let n = bars.len();
    if n == 0 {
        return None;
    }
    let sum: f64 = bars
        .iter()
        .map(|b| {
            let hc = (b.high / b.close).ln();
            let ho = (b.high / b.open).ln();
            let lc = (b.low / b.close).ln();
            let lo = (b.low / b.open).ln();
            hc * ho + lc * lo
        })
        .sum();
    Some((sum / n as f64).max(0.0))
}

/// Parkinson per-day variance: Σ ln(H/L)² / (4 n ln 2).
fn parkinson_variance(bars: &[DailyBar]) -> Option<f64> {
    let n = bars.len();
    if n == 0 {
        return None;
    }
    let sum: f64 = bars.iter().map(|b| (b.high / b.low).ln().powi(2)).sum();
    Some(sum / (4.0 * n as f64 * std::f64::consts::LN_2))
}

/// Garman-Klass per-day variance:
/// mean of 0.5·ln(H/L)² − (2 ln 2 − 1)·ln(C/O)².
fn garman_klass_variance(bars: &[DailyBar]) -> Option<f64> {
    let n = bars.len();
    if n == 0 {
        return None;
    }
    let sum: f64 = bars
        .iter()
        .map(|b| {
            let hl = (b.high / b.low).ln();
            let co = (b.close / b.open).ln();
            0.5 * hl * hl - (2.0 * std::f64::consts::LN_2 - 1.0) * co * co
        })
        .sum();
    Some((sum / n as f64).max(0.0))
}

/// Yang-Zhang per-day variance: σ²_O + k·σ²_C + (1−k)·σ²_RS with
/// k = 0.34 / (1.34 + (n+1)/(n−1)), the minimum-variance,
/// drift-independent weighting. `bars` carries window+1 entries; the first
/// supplies the prior close for the opening-jump term.
fn yang_zhang_variance(bars: &[DailyBar]) -> Option<f64> {
    let n = bars.len() - 1;
    if n < 2 {
        return None;
    }
    let window = &bars[1..];

    // Overnight (close-to-open) log returns
    let opens: Vec<f64> = (0..n)
        .map(|i| (bars[i + 1].open / bars[i].close).ln())
        .collect();
    // Intraday (open-to-close) log returns
    let closes: Vec<f64> = window.iter().map(|b| (b.close / b.open).ln()).collect();

    let var_open = sample_variance(&opens);
    let var_close = sample_variance(&closes);
    let var_rs = rogers_satchell_variance(window)?;

    let nf = n as f64;
    let k = 0.34 / (1.34 + (nf + 1.0) / (nf - 1.0));
    Some((var_open + k * var_close + (1.0 - k) * var_rs).max(0.0))
}

fn sample_variance(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / n as f64;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)
}
