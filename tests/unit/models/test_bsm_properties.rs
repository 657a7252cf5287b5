//! Property-based tests for the BSM valuator invariants

use creditscout::market::OptionRight;
use creditscout::models::bsm;
use proptest::prelude::*;

proptest! {
    #[test]
    fn put_call_parity_holds(
        s in 10.0f64..500.0,
        k in 10.0f64..500.0,
        t in 0.01f64..2.0,
        r in 0.0f64..0.10,
        sigma in 0.05f64..1.5,
    ) {
        let call = bsm::price(s, k, t, r, sigma, OptionRight::Call).price;
        let put = bsm::price(s, k, t, r, sigma, OptionRight::Put).price;
        let parity = s - k * (-r * t).exp();
        prop_assert!((call - put - parity).abs() < 1e-6);
    }

    #[test]
    fn greek_bounds_hold(
        s in 10.0f64..500.0,
        k in 10.0f64..500.0,
        t in 0.01f64..2.0,
        r in 0.0f64..0.10,
        sigma in 0.05f64..1.5,
    ) {
        let call = bsm::price(s, k, t, r, sigma, OptionRight::Call);
        let put = bsm::price(s, k, t, r, sigma, OptionRight::Put);

        prop_assert!(call.vega > 0.0);
        prop_assert!((0.0..=1.0).contains(&call.delta));
        prop_assert!((-1.0..=0.0).contains(&put.delta));
        prop_assert!(call.gamma >= 0.0);
        prop_assert!(put.gamma >= 0.0);
        // Gamma and vega are identical across rights
        prop_assert!((call.gamma - put.gamma).abs() < 1e-12);
        prop_assert!((call.vega - put.vega).abs() < 1e-10);
    }

    #[test]
    fn implied_vol_round_trips(
        sigma in 0.1f64..2.0,
        moneyness in 0.9f64..1.1,
    ) {
        let s = 100.0;
        let k = s * moneyness;
        let (t, r) = (0.3, 0.03);
        let target = bsm::price(s, k, t, r, sigma, OptionRight::Call).price;
        // Quotes with no extrinsic value carry no vol information; only
        // test prices a chain would realistically identify
        let forward_intrinsic = (s - k * (-r * t as f64).exp()).max(0.0);
        prop_assume!(target - forward_intrinsic > 1e-3);
        let recovered = bsm::implied_vol(target, s, k, t, r, OptionRight::Call);
        prop_assert!(
            (recovered - sigma).abs() < 1e-4,
            "σ={} recovered={}",
            sigma,
            recovered
        );
    }

    #[test]
    fn price_is_monotone_in_vol(
        s in 50.0f64..200.0,
        k in 50.0f64..200.0,
        sigma in 0.05f64..1.0,
    ) {
        let lo = bsm::price(s, k, 0.5, 0.03, sigma, OptionRight::Call).price;
        let hi = bsm::price(s, k, 0.5, 0.03, sigma + 0.1, OptionRight::Call).price;
        prop_assert!(hi >= lo - 1e-10);
    }
}
