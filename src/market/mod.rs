// Market data model: option contracts, quote history, option chain

pub mod chain_loader;
pub mod csv_loader;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Contract right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

/// Implied-vol and Greeks snapshot carried on a quote. Zeros mean the
/// caller had no datum for that field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GreeksSnapshot {
    #[serde(default)]
    pub bid_iv: f64,
    #[serde(default)]
    pub mid_iv: f64,
    #[serde(default)]
    pub ask_iv: f64,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub gamma: f64,
    #[serde(default)]
    pub theta: f64,
    #[serde(default)]
    pub vega: f64,
    #[serde(default)]
    pub rho: f64,
}

/// One listed option with its quote and Greeks snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub strike: f64,
    pub expiration: NaiveDate,
    pub right: OptionRight,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub volume: i64,
    #[serde(default)]
    pub open_interest: i64,
    #[serde(flatten)]
    pub greeks: GreeksSnapshot,
}

impl OptionContract {
    /// Mid-point of bid/ask.
    pub fn mid_price(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Bid-ask spread in dollars.
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// (ask − bid) / mid; None when there is no usable mid.
    pub fn relative_spread(&self) -> Option<f64> {
        let mid = self.mid_price();
        if mid > 0.0 {
            Some(self.spread() / mid)
        } else {
            None
        }
    }

    /// Basic quote sanity: positive strike, bid ≤ ask when both present.
    pub fn is_well_formed(&self) -> bool {
        self.strike > 0.0 && (self.bid <= self.ask || self.bid <= 0.0 || self.ask <= 0.0)
    }
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Strictly chronological daily bars. Adjacent indices are treated as
/// consecutive trading days.
#[derive(Debug, Clone)]
pub struct QuoteHistory {
    bars: Vec<DailyBar>,
}

impl QuoteHistory {
    /// Validates chronology and bar sanity; a malformed history is the one
    /// input error surfaced synchronously before any work starts.
    pub fn new(bars: Vec<DailyBar>) -> Result<Self, EngineError> {
        if bars.is_empty() {
            return Err(EngineError::InputInvalid("empty quote history".into()));
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(EngineError::InputInvalid(format!(
                    "quote history not strictly chronological at {}",
                    pair[1].date
                )));
            }
        }
        for bar in &bars {
            let body_ok = bar.low <= bar.open.min(bar.close) && bar.high >= bar.open.max(bar.close);
            if !body_ok || bar.low <= 0.0 {
                return Err(EngineError::InputInvalid(format!(
                    "inconsistent OHLC bar on {}",
                    bar.date
                )));
            }
        }
        Ok(QuoteHistory { bars })
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent close.
    pub fn last_close(&self) -> f64 {
        self.bars.last().map(|b| b.close).unwrap_or(0.0)
    }

    /// Close-to-close log returns, oldest first.
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }

    /// Overnight log gaps ln(open_t / close_{t−1}), oldest first.
    pub fn overnight_gaps(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| (w[1].open / w[0].close).ln())
            .collect()
    }
}

/// Options grouped by expiration. Within one expiration, strikes are
/// unique per right.
#[derive(Debug, Clone, Default)]
pub struct OptionChain {
    by_expiration: BTreeMap<NaiveDate, Vec<OptionContract>>,
}

impl OptionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, contract: OptionContract) {
        self.by_expiration
            .entry(contract.expiration)
            .or_default()
            .push(contract);
    }

    pub fn is_empty(&self) -> bool {
        self.by_expiration.values().all(|v| v.is_empty())
    }

    pub fn expirations(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_expiration.keys().copied()
    }

    pub fn contracts(&self, expiration: NaiveDate) -> &[OptionContract] {
        self.by_expiration
            .get(&expiration)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All contracts across expirations.
    pub fn iter_all(&self) -> impl Iterator<Item = &OptionContract> {
        self.by_expiration.values().flatten()
    }

    /// Contracts of one right at one expiration, sorted by strike.
    pub fn by_right(&self, expiration: NaiveDate, right: OptionRight) -> Vec<&OptionContract> {
        let mut out: Vec<&OptionContract> = self
            .contracts(expiration)
            .iter()
            .filter(|c| c.right == right)
            .collect();
        out.sort_by(|a, b| a.strike.partial_cmp(&b.strike).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    /// Expirations whose DTE relative to `today` lies in [min_dte, max_dte].
    pub fn expirations_within(
        &self,
        today: NaiveDate,
        min_dte: i64,
        max_dte: i64,
    ) -> Vec<NaiveDate> {
        self.by_expiration
            .keys()
            .copied()
            .filter(|exp| {
                let dte = (*exp - today).num_days();
                dte >= min_dte && dte <= max_dte
            })
            .collect()
    }
}
