//! Monte-Carlo sanity: probability bands, tail-statistic ordering, and
//! the degenerate single-spread composite score

use creditscout::config::ScoreWeights;
use creditscout::engine::score;
use creditscout::engine::{ProbabilityResult, ScoredSpread};
use creditscout::market::{GreeksSnapshot, OptionChain, OptionContract, OptionRight};
use creditscout::math::rng::SplitMix64;
use creditscout::models::merton::{MertonModel, MertonParams};
use creditscout::spreads::{enumerate_spreads, EnumerationParams, SpreadKind};

/// Lognormal terminal sanity: S=100, σ=0.20, r=0.03, T=30/365; the
/// probability of finishing above 95 sits in a tight band at N=10000.
#[test]
fn win_probability_band_for_reference_bull_put() {
    // A jump-free Merton is exact GBM
    let gbm = MertonModel::new(MertonParams {
        sigma: 0.20,
        lambda: 0.0,
        mu: 0.0,
        delta: 0.0,
    });
    let mut rng = SplitMix64::new(2024);
    // Daily granularity: 30 steps of 1/252 each
    let (s0, rate, sim_tau) = (100.0, 0.03, 30.0 / 252.0);
    let n = 10_000;

    let wins = (0..n)
        .filter(|_| {
            let terminal = gbm.simulate_terminal(s0, rate, sim_tau, 30, None, &mut rng);
            terminal > 95.0
        })
        .count();
    let probability = wins as f64 / n as f64;
    assert!(
        (0.73..=0.79).contains(&probability),
        "P(ST>95) = {}",
        probability
    );
}

fn reference_spread() -> creditscout::spreads::OptionSpread {
    let mut chain = OptionChain::new();
    for (k, b, a) in [(90.0, 0.30, 0.35), (95.0, 0.80, 0.85)] {
        chain.insert(OptionContract {
            underlying: "XYZ".into(),
            strike: k,
            expiration: "2025-04-02".parse().unwrap(),
            right: OptionRight::Put,
            bid: b,
            ask: a,
            volume: 120,
            open_interest: 400,
            greeks: GreeksSnapshot {
                bid_iv: 0.19,
                mid_iv: 0.20,
                ask_iv: 0.21,
                ..Default::default()
            },
        });
    }
    enumerate_spreads(
        &chain,
        SpreadKind::BullPut,
        100.0,
        "2025-03-03".parse().unwrap(),
        &EnumerationParams {
            min_dte: 1,
            max_dte: 60,
            min_ror: 0.1,
            risk_free_rate: 0.03,
        },
    )
    .into_iter()
    .next()
    .expect("reference candidate")
}

fn scored_fixture() -> ScoredSpread {
    let spread = reference_spread();
    let gbm = MertonModel::new(MertonParams {
        sigma: 0.20,
        lambda: 0.0,
        mu: 0.0,
        delta: 0.0,
    });
    let mut rng = SplitMix64::new(7);
    let sim_tau = spread.days_to_expiration as f64 / 252.0;

    let terminals: Vec<f64> = (0..10_000)
        .map(|_| gbm.simulate_terminal(100.0, 0.03, sim_tau, 30, None, &mut rng))
        .collect();
    let wins = terminals.iter().filter(|&&t| t > 95.0).count();

    let mut pnls: Vec<f64> = terminals.iter().map(|&t| spread.path_pnl(t)).collect();
    pnls.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let q = |alpha: f64| pnls[((pnls.len() - 1) as f64 * alpha) as usize];
    let var95 = q(0.05).min(0.0);
    let var99 = q(0.01).min(0.0);
    let tail: Vec<f64> = pnls.iter().copied().filter(|&p| p <= q(0.05)).collect();
    let es = (tail.iter().sum::<f64>() / tail.len() as f64).min(0.0);

    let mut probability = ProbabilityResult::default();
    probability.insert(
        "short_mid_iv_merton".into(),
        wins as f64 / terminals.len() as f64,
    );

    ScoredSpread {
        liquidity: spread.liquidity(),
        volume: spread.total_volume(),
        spread,
        probability,
        var95,
        var99,
        expected_shortfall: es,
        composite_score: 0.0,
        model_params: Vec::new(),
    }
}

#[test]
fn tail_quantiles_are_ordered() {
    let scored = scored_fixture();
    assert!(scored.var99.abs() >= scored.var95.abs());
    assert!(scored.expected_shortfall.abs() >= scored.var95.abs());
}

#[test]
fn single_spread_population_scores_one_before_damper() {
    let mut scored = scored_fixture();
    scored.volume = 0; // Make the damper exactly 1
    let ranked = score::rank(vec![scored], &ScoreWeights::default());
    assert!((ranked[0].composite_score - 1.0).abs() < 1e-12);
}

#[test]
fn pnl_respects_credit_and_risk_bounds() {
    let spread = reference_spread();
    let mut rng = SplitMix64::new(99);
    let gbm = MertonModel::new(MertonParams {
        sigma: 0.4,
        lambda: 0.0,
        mu: 0.0,
        delta: 0.0,
    });
    for _ in 0..2000 {
        let terminal = gbm.simulate_terminal(100.0, 0.03, 0.1, 25, None, &mut rng);
        let pnl = spread.path_pnl(terminal);
        assert!(pnl <= spread.credit + 1e-12);
        assert!(pnl >= -spread.max_risk - 1e-12);
    }
}
