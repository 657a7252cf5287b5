// Two-leg vertical credit spreads: legs, combined Greeks, enumeration

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

use crate::market::{OptionChain, OptionContract, OptionRight};
use crate::models::bsm;

/// Credit-spread flavor. Bull puts profit when the underlying closes
/// above the short strike; bear calls when it closes below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadKind {
    BullPut,
    BearCall,
}

impl SpreadKind {
    pub fn right(&self) -> OptionRight {
        match self {
            SpreadKind::BullPut => OptionRight::Put,
            SpreadKind::BearCall => OptionRight::Call,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpreadKind::BullPut => "bull_put",
            SpreadKind::BearCall => "bear_call",
        }
    }

    /// Strike ordering rule: the short leg sits closer to the money.
    pub fn strikes_ordered(&self, short_strike: f64, long_strike: f64) -> bool {
        match self {
            SpreadKind::BullPut => short_strike > long_strike,
            SpreadKind::BearCall => short_strike < long_strike,
        }
    }

    /// Profit condition on a terminal price.
    pub fn is_profitable(&self, terminal: f64, short_strike: f64) -> bool {
        match self {
            SpreadKind::BullPut => terminal > short_strike,
            SpreadKind::BearCall => terminal < short_strike,
        }
    }
}

/// One leg: the contract plus its BSM valuation at enumeration time.
#[derive(Debug, Clone)]
pub struct SpreadLeg {
    pub contract: OptionContract,
    pub valuation: bsm::Greeks,
    pub intrinsic: f64,
    pub extrinsic: f64,
    /// The volatility the leg was valued at (quoted mid IV, or solved
    /// from the mid quote when the snapshot is empty).
    pub sigma: f64,
}

impl SpreadLeg {
    /// Build and value a leg; None when no usable volatility exists or
    /// the valuation degenerates.
    pub fn build(contract: &OptionContract, spot: f64, tau: f64, rate: f64) -> Option<SpreadLeg> {
        let sigma = if contract.greeks.mid_iv > 0.0 {
            contract.greeks.mid_iv
        } else {
            bsm::implied_vol(
                contract.mid_price(),
                spot,
                contract.strike,
                tau,
                rate,
                contract.right,
            )
        };
        if !sigma.is_finite() || sigma <= 0.0 {
            return None;
        }

        let valuation = bsm::price(spot, contract.strike, tau, rate, sigma, contract.right);
        if !valuation.price.is_finite() || !valuation.delta.is_finite() {
            return None;
        }

        let intrinsic = match contract.right {
            OptionRight::Call => (spot - contract.strike).max(0.0),
            OptionRight::Put => (contract.strike - spot).max(0.0),
        };
        let extrinsic = (valuation.price - intrinsic).max(0.0);

        Some(SpreadLeg {
            contract: contract.clone(),
            valuation,
            intrinsic,
            extrinsic,
            sigma,
        })
    }
}

/// Net Greeks of the position, short leg minus long leg.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpreadGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// A fully valued candidate spread.
#[derive(Debug, Clone)]
pub struct OptionSpread {
    pub kind: SpreadKind,
    pub short: SpreadLeg,
    pub long: SpreadLeg,
    pub expiration: NaiveDate,
    pub days_to_expiration: i64,
    /// Net premium received: short bid − long ask.
    pub credit: f64,
    /// Strike distance minus credit; the capital at risk.
    pub max_risk: f64,
    /// credit / max_risk.
    pub return_on_risk: f64,
    /// Net BSM model value of the position.
    pub bsm_price: f64,
    pub intrinsic: f64,
    pub extrinsic: f64,
    pub greeks: SpreadGreeks,
}

impl OptionSpread {
    /// Assemble from two built legs; None when the economics degenerate
    /// (non-positive credit or max risk, wrong ordering).
    pub fn assemble(
        kind: SpreadKind,
        short: SpreadLeg,
        long: SpreadLeg,
        today: NaiveDate,
    ) -> Option<OptionSpread> {
        let short_strike = short.contract.strike;
        let long_strike = long.contract.strike;
        if !kind.strikes_ordered(short_strike, long_strike) {
            return None;
        }
        if short.contract.expiration != long.contract.expiration
            || short.contract.right != long.contract.right
        {
            return None;
        }

        let credit = short.contract.bid - long.contract.ask;
        let width = (short_strike - long_strike).abs();
        let max_risk = width - credit;
        if credit <= 0.0 || max_risk <= 0.0 {
            return None;
        }

        let expiration = short.contract.expiration;
        let days_to_expiration = (expiration - today).num_days();

        let greeks = SpreadGreeks {
            delta: short.valuation.delta - long.valuation.delta,
            gamma: short.valuation.gamma - long.valuation.gamma,
            theta: short.valuation.theta - long.valuation.theta,
            vega: short.valuation.vega - long.valuation.vega,
            rho: short.valuation.rho - long.valuation.rho,
        };

        Some(OptionSpread {
            kind,
            expiration,
            days_to_expiration,
            credit,
            max_risk,
            return_on_risk: credit / max_risk,
            bsm_price: short.valuation.price - long.valuation.price,
            intrinsic: short.intrinsic - long.intrinsic,
            extrinsic: short.extrinsic - long.extrinsic,
            greeks,
            short,
            long,
        })
    }

    /// Expiration PnL of one path: credit minus the assigned loss, which
    /// lands in [−max_risk, credit].
    pub fn path_pnl(&self, terminal: f64) -> f64 {
        let short_k = self.short.contract.strike;
        let long_k = self.long.contract.strike;
        let assigned = match self.kind {
            SpreadKind::BullPut => (short_k - terminal).max(0.0) - (long_k - terminal).max(0.0),
            SpreadKind::BearCall => (terminal - short_k).max(0.0) - (terminal - long_k).max(0.0),
        };
        self.credit - assigned
    }

    /// Combined traded volume of both legs.
    pub fn total_volume(&self) -> i64 {
        self.short.contract.volume + self.long.contract.volume
    }

    /// Mean relative bid-ask spread of the legs with a usable mid.
    pub fn liquidity(&self) -> f64 {
        let spreads: Vec<f64> = [&self.short, &self.long]
            .iter()
            .filter_map(|leg| leg.contract.relative_spread())
            .collect();
        if spreads.is_empty() {
            0.0
        } else {
            spreads.iter().sum::<f64>() / spreads.len() as f64
        }
    }
}

/// Enumeration bounds and thresholds.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationParams {
    pub min_dte: i64,
    pub max_dte: i64,
    /// Quoted return-on-risk floor applied before full valuation.
    pub min_ror: f64,
    pub risk_free_rate: f64,
}

/// Enumerate all candidate spreads of `kind` in the chain: per
/// expiration in the DTE window, every ordered pair of distinct strikes
/// obeying the kind's ordering rule. A quote-only ROR prefilter runs
/// before the BSM legs are built; candidates that fail valuation are
/// dropped silently.
pub fn enumerate_spreads(
    chain: &OptionChain,
    kind: SpreadKind,
    spot: f64,
    today: NaiveDate,
    params: &EnumerationParams,
) -> Vec<OptionSpread> {
    let mut spreads = Vec::new();
    if params.min_ror >= 1.0 {
        // A credit spread's ROR is bounded below 1 by construction
        return spreads;
    }

    for expiration in chain.expirations_within(today, params.min_dte, params.max_dte) {
        let contracts = chain.by_right(expiration, kind.right());
        let tau = (expiration - today).num_days() as f64 / 365.0;
        if tau <= 0.0 {
            continue;
        }

        for short in &contracts {
            for long in &contracts {
                if !kind.strikes_ordered(short.strike, long.strike) {
                    continue;
                }

                // Quote-only prefilter: skip the BSM work for thin credits
                let credit = short.bid - long.ask;
                let width = (short.strike - long.strike).abs();
                let max_risk = width - credit;
                if credit <= 0.0 || max_risk <= 0.0 || credit / max_risk < params.min_ror {
                    continue;
                }

                let Some(short_leg) = SpreadLeg::build(short, spot, tau, params.risk_free_rate)
                else {
                    continue;
                };
                let Some(long_leg) = SpreadLeg::build(long, spot, tau, params.risk_free_rate)
                else {
                    continue;
                };

                if let Some(spread) = OptionSpread::assemble(kind, short_leg, long_leg, today) {
                    spreads.push(spread);
                }
            }
        }
    }

    debug!(
        "enumerated {} {} candidates (min_ror {})",
        spreads.len(),
        kind.name(),
        params.min_ror
    );
    spreads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::GreeksSnapshot;

    fn put(strike: f64, bid: f64, ask: f64) -> OptionContract {
        OptionContract {
            underlying: "XYZ".into(),
            strike,
            expiration: "2025-04-02".parse().unwrap(),
            right: OptionRight::Put,
            bid,
            ask,
            volume: 50,
            open_interest: 200,
            greeks: GreeksSnapshot {
                bid_iv: 0.30,
                mid_iv: 0.32,
                ask_iv: 0.34,
                ..Default::default()
            },
        }
    }

    fn scenario_chain() -> OptionChain {
        // Underlying at 30, puts at {25, 27, 28, 29, 30}
        let quotes = [
            (25.0, 0.10, 0.12),
            (27.0, 0.35, 0.40),
            (28.0, 0.65, 0.70),
            (29.0, 1.10, 1.15),
            (30.0, 1.80, 1.85),
        ];
        let mut chain = OptionChain::new();
        for (strike, bid, ask) in quotes {
            chain.insert(put(strike, bid, ask));
        }
        chain
    }

    fn today() -> NaiveDate {
        "2025-03-03".parse().unwrap() // 30 days before expiration
    }

    fn params() -> EnumerationParams {
        EnumerationParams {
            min_dte: 1,
            max_dte: 60,
            min_ror: 0.15,
            risk_free_rate: 0.05,
        }
    }

    #[test]
    fn bull_put_enumeration_scenario() {
        let spreads =
            enumerate_spreads(&scenario_chain(), SpreadKind::BullPut, 30.0, today(), &params());

        // (short 28, long 27): credit 0.25, risk 0.75, ROR 1/3: passes
        let pass = spreads.iter().find(|s| {
            (s.short.contract.strike - 28.0).abs() < 1e-9
                && (s.long.contract.strike - 27.0).abs() < 1e-9
        });
        let pass = pass.expect("28/27 candidate should survive");
        assert!((pass.credit - 0.25).abs() < 1e-9);
        assert!((pass.max_risk - 0.75).abs() < 1e-9);
        assert!((pass.return_on_risk - 1.0 / 3.0).abs() < 1e-9);

        // (short 27, long 25): credit 0.23, risk 1.77, ROR 0.13: rejected
        assert!(!spreads.iter().any(|s| {
            (s.short.contract.strike - 27.0).abs() < 1e-9
                && (s.long.contract.strike - 25.0).abs() < 1e-9
        }));
    }

    #[test]
    fn ordering_rule_excludes_inverted_pairs() {
        let spreads =
            enumerate_spreads(&scenario_chain(), SpreadKind::BullPut, 30.0, today(), &params());
        for s in &spreads {
            assert!(s.short.contract.strike > s.long.contract.strike);
        }
    }

    #[test]
    fn min_ror_of_one_yields_nothing() {
        let mut p = params();
        p.min_ror = 1.0;
        let spreads = enumerate_spreads(&scenario_chain(), SpreadKind::BullPut, 30.0, today(), &p);
        assert!(spreads.is_empty());
    }

    #[test]
    fn credit_bounded_by_width() {
        let spreads =
            enumerate_spreads(&scenario_chain(), SpreadKind::BullPut, 30.0, today(), &params());
        for s in &spreads {
            let width = (s.short.contract.strike - s.long.contract.strike).abs();
            assert!(s.credit <= width);
            assert!(s.return_on_risk > 0.0);
        }
    }

    #[test]
    fn pnl_is_bounded_by_credit_and_risk() {
        let spreads =
            enumerate_spreads(&scenario_chain(), SpreadKind::BullPut, 30.0, today(), &params());
        let spread = &spreads[0];
        for terminal in [0.0, 20.0, 26.0, 27.5, 28.5, 30.0, 40.0] {
            let pnl = spread.path_pnl(terminal);
            assert!(pnl <= spread.credit + 1e-12);
            assert!(pnl >= -spread.max_risk - 1e-12);
        }
        // Deep OTM finish keeps the whole credit
        assert!((spread.path_pnl(100.0) - spread.credit).abs() < 1e-12);
    }

    #[test]
    fn out_of_window_expirations_are_skipped() {
        let mut p = params();
        p.min_dte = 45;
        let spreads = enumerate_spreads(&scenario_chain(), SpreadKind::BullPut, 30.0, today(), &p);
        assert!(spreads.is_empty());
    }

    #[test]
    fn bear_call_ordering() {
        let mut chain = OptionChain::new();
        for (strike, bid, ask) in [(31.0, 1.0, 1.05), (33.0, 0.40, 0.45), (35.0, 0.10, 0.12)] {
            let mut c = put(strike, bid, ask);
            c.right = OptionRight::Call;
            chain.insert(c);
        }
        let spreads = enumerate_spreads(&chain, SpreadKind::BearCall, 30.0, today(), &params());
        assert!(!spreads.is_empty());
        for s in &spreads {
            assert!(s.short.contract.strike < s.long.contract.strike);
        }
    }
}
