// Ranked-spread table and JSON diagnostic dump

use serde_json::{json, Value};

use crate::engine::ScoredSpread;

/// Print the ranked spreads as a fixed-width console table.
pub fn show_ranked_table(symbol: &str, ranked: &[ScoredSpread]) {
    println!("\n{}", "=".repeat(100));
    println!(
        "  {} - TOP CREDIT SPREADS ({} ranked)",
        symbol,
        ranked.len()
    );
    println!("{}", "=".repeat(100));
    println!(
        "{:<4} {:<10} {:>7} {:>7} {:>8} {:>8} {:>7} {:>8} {:>9} {:>9} {:>8} {:>9}",
        "#", "kind", "short", "long", "credit", "risk", "ROR", "P(win)", "VaR95", "ES", "liq", "score"
    );
    println!("{}", "-".repeat(100));

    for (rank, scored) in ranked.iter().enumerate() {
        let spread = &scored.spread;
        println!(
            "{:<4} {:<10} {:>7.2} {:>7.2} {:>8.2} {:>8.2} {:>6.1}% {:>7.1}% {:>9.3} {:>9.3} {:>7.3} {:>9.4}",
            rank + 1,
            spread.kind.name(),
            spread.short.contract.strike,
            spread.long.contract.strike,
            spread.credit,
            spread.max_risk,
            spread.return_on_risk * 100.0,
            scored.probability.average() * 100.0,
            scored.var95,
            scored.expected_shortfall,
            scored.liquidity,
            scored.composite_score,
        );
    }
    println!("{}", "=".repeat(100));
}

/// Serialize the ranking for diagnostic dumps. Probabilities are keyed
/// "<vol_name>_<model_name>"; degraded cells carry an explicit marker.
pub fn to_json(symbol: &str, ranked: &[ScoredSpread]) -> Value {
    let spreads: Vec<Value> = ranked
        .iter()
        .map(|scored| {
            let spread = &scored.spread;
            let probabilities: serde_json::Map<String, Value> = scored
                .probability
                .cells()
                .iter()
                .map(|(key, &p)| {
                    let value = if scored.probability.is_degraded(key) {
                        json!({ "probability": p, "degraded": true })
                    } else {
                        json!(p)
                    };
                    (key.clone(), value)
                })
                .collect();

            json!({
                "kind": spread.kind.name(),
                "expiration": spread.expiration.to_string(),
                "days_to_expiration": spread.days_to_expiration,
                "short": leg_json(&spread.short),
                "long": leg_json(&spread.long),
                "credit": spread.credit,
                "max_risk": spread.max_risk,
                "return_on_risk": spread.return_on_risk,
                "bsm_price": spread.bsm_price,
                "intrinsic": spread.intrinsic,
                "extrinsic": spread.extrinsic,
                "greeks": {
                    "delta": spread.greeks.delta,
                    "gamma": spread.greeks.gamma,
                    "theta": spread.greeks.theta,
                    "vega": spread.greeks.vega,
                    "rho": spread.greeks.rho,
                },
                "probabilities": probabilities,
                "probability_avg": scored.probability.average(),
                "var95": scored.var95,
                "var99": scored.var99,
                "expected_shortfall": scored.expected_shortfall,
                "liquidity": scored.liquidity,
                "volume": scored.volume,
                "composite_score": scored.composite_score,
                "model_params": scored.model_params,
            })
        })
        .collect();

    json!({ "symbol": symbol, "spreads": spreads })
}

fn leg_json(leg: &crate::spreads::SpreadLeg) -> Value {
    json!({
        "strike": leg.contract.strike,
        "right": match leg.contract.right {
            crate::market::OptionRight::Call => "call",
            crate::market::OptionRight::Put => "put",
        },
        "bid": leg.contract.bid,
        "ask": leg.contract.ask,
        "volume": leg.contract.volume,
        "open_interest": leg.contract.open_interest,
        "sigma": leg.sigma,
        "price": leg.valuation.price,
        "delta": leg.valuation.delta,
        "gamma": leg.valuation.gamma,
        "theta": leg.valuation.theta,
        "vega": leg.valuation.vega,
        "rho": leg.valuation.rho,
        "intrinsic": leg.intrinsic,
        "extrinsic": leg.extrinsic,
    })
}
