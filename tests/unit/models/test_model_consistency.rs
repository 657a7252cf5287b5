//! Cross-model pricing consistency: jump models must collapse to
//! Black-Scholes when their jump intensity vanishes, and every pricer
//! must respect put-call parity

use creditscout::market::OptionRight;
use creditscout::models::bsm;
use creditscout::models::cgmy::{CgmyModel, CgmyParams};
use creditscout::models::heston::{HestonModel, HestonParams};
use creditscout::models::kou::{KouModel, KouParams};
use creditscout::models::merton::{MertonModel, MertonParams};

const S0: f64 = 100.0;
const RATE: f64 = 0.04;
const TAU: f64 = 0.25;

#[test]
fn merton_without_jumps_is_black_scholes() {
    let model = MertonModel::new(MertonParams {
        sigma: 0.25,
        lambda: 0.0,
        mu: 0.0,
        delta: 0.0,
    });
    for strike in [80.0, 95.0, 100.0, 105.0, 120.0] {
        let merton = model.option_price(S0, strike, RATE, TAU, OptionRight::Call);
        let reference = bsm::price(S0, strike, TAU, RATE, 0.25, OptionRight::Call).price;
        assert!(
            (merton - reference).abs() < 1e-8,
            "K={}: {} vs {}",
            strike,
            merton,
            reference
        );
    }
}

#[test]
fn kou_without_jumps_matches_black_scholes() {
    let model = KouModel::new(KouParams {
        sigma: 0.25,
        lambda: 0.0,
        p_up: 0.5,
        eta1: 25.0,
        eta2: 25.0,
    });
    for strike in [85.0, 100.0, 115.0] {
        let kou = model.option_price(S0, strike, RATE, TAU, OptionRight::Call);
        let reference = bsm::price(S0, strike, TAU, RATE, 0.25, OptionRight::Call).price;
        assert!(
            (kou - reference).abs() < 0.02,
            "K={}: {} vs {}",
            strike,
            kou,
            reference
        );
    }
}

#[test]
fn all_pricers_respect_parity() {
    let heston = HestonModel::new(HestonParams::fallback());
    let merton = MertonModel::new(MertonParams {
        sigma: 0.2,
        lambda: 1.5,
        mu: -0.03,
        delta: 0.08,
    });
    let kou = KouModel::new(KouParams {
        sigma: 0.2,
        lambda: 1.5,
        p_up: 0.4,
        eta1: 20.0,
        eta2: 15.0,
    });
    let cgmy = CgmyModel::new(CgmyParams::fallback());
    let strike = 95.0;
    let parity = S0 - strike * (-RATE * TAU).exp();

    let pairs = [
        (
            "heston",
            heston.option_price(S0, strike, RATE, TAU, OptionRight::Call)
                - heston.option_price(S0, strike, RATE, TAU, OptionRight::Put),
        ),
        (
            "merton",
            merton.option_price(S0, strike, RATE, TAU, OptionRight::Call)
                - merton.option_price(S0, strike, RATE, TAU, OptionRight::Put),
        ),
        (
            "kou",
            kou.option_price(S0, strike, RATE, TAU, OptionRight::Call)
                - kou.option_price(S0, strike, RATE, TAU, OptionRight::Put),
        ),
        (
            "cgmy",
            cgmy.option_price(S0, strike, RATE, TAU, OptionRight::Call)
                - cgmy.option_price(S0, strike, RATE, TAU, OptionRight::Put),
        ),
    ];
    for (name, gap) in pairs {
        assert!(
            (gap - parity).abs() < 0.05,
            "{} parity gap: {} vs {}",
            name,
            gap,
            parity
        );
    }
}

#[test]
fn jump_intensity_widens_the_smile() {
    // More jumps make deep-OTM protection more valuable
    let calm = MertonModel::new(MertonParams {
        sigma: 0.2,
        lambda: 0.0,
        mu: 0.0,
        delta: 0.0,
    });
    let stressed = MertonModel::new(MertonParams {
        sigma: 0.2,
        lambda: 4.0,
        mu: -0.05,
        delta: 0.10,
    });
    let otm_put = 75.0;
    assert!(
        stressed.option_price(S0, otm_put, RATE, TAU, OptionRight::Put)
            > calm.option_price(S0, otm_put, RATE, TAU, OptionRight::Put)
    );
}

#[test]
fn cgmy_price_increases_with_variance_rate() {
    let base = CgmyModel::new(CgmyParams::fallback());
    let hotter = base.with_target_vol(base.params.variance_rate().sqrt() * 1.5);
    let atm_call_base = base.option_price(S0, 100.0, RATE, TAU, OptionRight::Call);
    let atm_call_hot = hotter.option_price(S0, 100.0, RATE, TAU, OptionRight::Call);
    assert!(atm_call_hot > atm_call_base);
}
