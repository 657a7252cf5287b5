//! End-to-end pipeline scenarios on synthetic market data

use chrono::NaiveDate;
use creditscout::config::EngineConfig;
use creditscout::engine::ScoredSpread;
use creditscout::market::{
    DailyBar, GreeksSnapshot, OptionChain, OptionContract, OptionRight, QuoteHistory,
};
use creditscout::math::rng::SplitMix64;
use creditscout::pipeline::{discover, CancelToken, DiscoveryParams};
use creditscout::utils::table_out;

fn synthetic_history(days: usize) -> QuoteHistory {
    let start: NaiveDate = "2024-01-01".parse().unwrap();
    let mut rng = SplitMix64::new(31);
    let mut close = 30.0;
    let mut bars = Vec::with_capacity(days);
    for i in 0..days {
        let open = close * (0.003 * rng.next_normal()).exp();
        close = open * (0.012 * rng.next_normal()).exp();
        let high = open.max(close) * 1.004;
        let low = open.min(close) * 0.996;
        bars.push(DailyBar {
            date: start + chrono::Days::new(i as u64),
            open,
            high,
            low,
            close,
            volume: 5e5,
        });
    }
    QuoteHistory::new(bars).unwrap()
}

fn put(strike: f64, bid: f64, ask: f64) -> OptionContract {
    OptionContract {
        underlying: "XYZ".into(),
        strike,
        expiration: "2025-04-02".parse().unwrap(),
        right: OptionRight::Put,
        bid,
        ask,
        volume: 150,
        open_interest: 800,
        greeks: GreeksSnapshot {
            bid_iv: 0.29,
            mid_iv: 0.31,
            ask_iv: 0.33,
            ..Default::default()
        },
    }
}

fn scenario_chain() -> OptionChain {
    let mut chain = OptionChain::new();
    for (strike, bid, ask) in [
        (25.0, 0.10, 0.12),
        (27.0, 0.35, 0.40),
        (28.0, 0.65, 0.70),
        (29.0, 1.10, 1.15),
        (30.0, 1.80, 1.85),
    ] {
        chain.insert(put(strike, bid, ask));
    }
    chain
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        simulations_per_cell: 50,
        calibration_max_iterations: 30,
        seed: Some(42),
        ..Default::default()
    }
}

fn base_params() -> DiscoveryParams {
    DiscoveryParams {
        min_dte: 7,
        max_dte: 60,
        min_ror: 0.15,
        risk_free_rate: 0.03,
        indicator: 1,
        top_k: 10,
    }
}

fn today() -> NaiveDate {
    "2025-03-03".parse().unwrap()
}

#[test]
fn full_run_produces_a_ranked_list() {
    let ranked = discover(
        "XYZ",
        &synthetic_history(300),
        &scenario_chain(),
        30.0,
        today(),
        &base_params(),
        &fast_config(),
        &CancelToken::new(),
    )
    .expect("pipeline succeeds");

    assert!(!ranked.is_empty());
    assert!(ranked.len() <= 10);

    // Descending composite order, deterministic tie-breaks
    for pair in ranked.windows(2) {
        assert!(pair[0].composite_score >= pair[1].composite_score);
    }

    for scored in &ranked {
        assert!(scored.spread.credit > 0.0);
        assert!(scored.spread.max_risk > 0.0);
        assert!(scored.spread.return_on_risk >= 0.15);
        assert!(scored.var99 <= 0.0 && scored.var95 <= 0.0);
        assert!(scored.var99.abs() >= scored.var95.abs());
        for (key, &p) in scored.probability.cells() {
            assert!((0.0..=1.0).contains(&p), "{} = {}", key, p);
        }
        // Calibration snapshots ride along
        assert_eq!(scored.model_params.len(), 4);
    }

    // The canonical 28/27 candidate survives enumeration and scoring
    assert!(ranked.iter().any(|s| {
        (s.spread.short.contract.strike - 28.0).abs() < 1e-9
            && (s.spread.long.contract.strike - 27.0).abs() < 1e-9
    }));
}

#[test]
fn top_k_truncates_the_ranking() {
    let mut params = base_params();
    params.top_k = 2;
    let ranked = discover(
        "XYZ",
        &synthetic_history(300),
        &scenario_chain(),
        30.0,
        today(),
        &params,
        &fast_config(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(ranked.len() <= 2);
}

#[test]
fn bear_call_indicator_flips_the_kind() {
    let mut chain = OptionChain::new();
    for (strike, bid, ask) in [(31.0, 1.20, 1.25), (33.0, 0.45, 0.50), (35.0, 0.12, 0.15)] {
        let mut c = put(strike, bid, ask);
        c.right = OptionRight::Call;
        chain.insert(c);
    }
    let mut params = base_params();
    params.indicator = -1;

    let ranked = discover(
        "XYZ",
        &synthetic_history(300),
        &chain,
        30.0,
        today(),
        &params,
        &fast_config(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(!ranked.is_empty());
    for scored in &ranked {
        assert!(scored.spread.short.contract.strike < scored.spread.long.contract.strike);
    }
}

#[test]
fn empty_chain_returns_empty_ranking() {
    let ranked = discover(
        "XYZ",
        &synthetic_history(300),
        &OptionChain::new(),
        30.0,
        today(),
        &base_params(),
        &fast_config(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(ranked.is_empty());
}

#[test]
fn pre_cancelled_run_reports_cancellation() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = discover(
        "XYZ",
        &synthetic_history(300),
        &scenario_chain(),
        30.0,
        today(),
        &base_params(),
        &fast_config(),
        &cancel,
    );
    assert!(result.is_err());
}

#[test]
fn short_history_still_ranks_via_fallbacks() {
    // 40 bars: too short for most estimator windows and all calibrators;
    // fallback parameters keep the run alive
    let ranked = discover(
        "XYZ",
        &synthetic_history(40),
        &scenario_chain(),
        30.0,
        today(),
        &base_params(),
        &fast_config(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(!ranked.is_empty());
    let any_fallback = ranked[0].model_params.iter().any(|snapshot| {
        matches!(
            snapshot,
            creditscout::models::ParamsSnapshot::Merton { fallback: true, .. }
                | creditscout::models::ParamsSnapshot::Cgmy { fallback: true, .. }
        )
    });
    assert!(any_fallback);
}

#[test]
fn json_dump_round_trips_through_serde() {
    let ranked: Vec<ScoredSpread> = discover(
        "XYZ",
        &synthetic_history(300),
        &scenario_chain(),
        30.0,
        today(),
        &base_params(),
        &fast_config(),
        &CancelToken::new(),
    )
    .unwrap();

    let value = table_out::to_json("XYZ", &ranked);
    assert_eq!(value["symbol"], "XYZ");
    let spreads = value["spreads"].as_array().unwrap();
    assert_eq!(spreads.len(), ranked.len());
    // Keys follow "<vol>_<model>"
    let probabilities = spreads[0]["probabilities"].as_object().unwrap();
    assert!(probabilities.keys().any(|k| k.ends_with("_heston")));
    assert!(probabilities.keys().any(|k| k.ends_with("_merton")));
}
