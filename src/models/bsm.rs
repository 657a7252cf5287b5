// Black-Scholes-Merton pricer: price, Greeks, implied vol, shadow/skew gamma

use crate::market::OptionRight;
use crate::math::dist::{norm_cdf, norm_pdf};

/// Implied-vol solver settings (Newton-Raphson).
pub const IV_TOLERANCE: f64 = 1e-8;
pub const IV_MAX_ITERATIONS: usize = 100;
const IV_INITIAL_GUESS: f64 = 0.5;
const IV_FLOOR: f64 = 1e-4;

/// Full valuation output for one European option.
#[derive(Debug, Clone, Copy)]
pub struct Greeks {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// European price + Greeks under constant-vol BSM.
/// Expired options collapse to intrinsic with step deltas.
pub fn price(s: f64, k: f64, t: f64, r: f64, sigma: f64, right: OptionRight) -> Greeks {
    if t <= 0.0 || sigma <= 0.0 {
        return intrinsic_greeks(s, k, right);
    }

    let sqrt_t = t.sqrt();
    let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;
    let pdf_d1 = norm_pdf(d1);
    let e_rt = (-r * t).exp();

    match right {
        OptionRight::Call => {
            let nd1 = norm_cdf(d1);
            let nd2 = norm_cdf(d2);
            Greeks {
                price: s * nd1 - k * e_rt * nd2,
                delta: nd1,
                gamma: pdf_d1 / (s * sigma * sqrt_t),
                theta: -(s * pdf_d1 * sigma) / (2.0 * sqrt_t) - r * k * e_rt * nd2,
                vega: s * sqrt_t * pdf_d1,
                rho: k * t * e_rt * nd2,
            }
        }
        OptionRight::Put => {
            let nd1_neg = norm_cdf(-d1);
            let nd2_neg = norm_cdf(-d2);
            Greeks {
                price: k * e_rt * nd2_neg - s * nd1_neg,
                delta: norm_cdf(d1) - 1.0,
                gamma: pdf_d1 / (s * sigma * sqrt_t),
                theta: -(s * pdf_d1 * sigma) / (2.0 * sqrt_t) + r * k * e_rt * nd2_neg,
                vega: s * sqrt_t * pdf_d1,
                rho: -k * t * e_rt * nd2_neg,
            }
        }
    }
}

fn intrinsic_greeks(s: f64, k: f64, right: OptionRight) -> Greeks {
    let (price, delta) = match right {
        OptionRight::Call => ((s - k).max(0.0), if s > k { 1.0 } else { 0.0 }),
        OptionRight::Put => ((k - s).max(0.0), if s < k { -1.0 } else { 0.0 }),
    };
    Greeks {
        price,
        delta,
        gamma: 0.0,
        theta: 0.0,
        vega: 0.0,
        rho: 0.0,
    }
}

/// Implied volatility by Newton-Raphson: σ₀ = 0.5, step (model − target)/Vega,
/// σ clipped at 1e-4. NaN on non-convergence so callers can flag the quote
/// as degenerate.
pub fn implied_vol(target: f64, s: f64, k: f64, t: f64, r: f64, right: OptionRight) -> f64 {
    if !target.is_finite() || target <= 0.0 || t <= 0.0 || s <= 0.0 || k <= 0.0 {
        return f64::NAN;
    }

    let mut sigma = IV_INITIAL_GUESS;
    for _ in 0..IV_MAX_ITERATIONS {
        let greeks = price(s, k, t, r, sigma, right);
        let diff = greeks.price - target;
        if diff.abs() < IV_TOLERANCE {
            return sigma;
        }
        if greeks.vega.abs() < 1e-12 {
            return f64::NAN;
        }
        sigma = (sigma - diff / greeks.vega).max(IV_FLOOR);
    }
    f64::NAN
}

/// Shadow gammas: delta finite-differenced between the base state and a
/// bumped state where spot moves ±1% together with a ±5% vol shift.
/// Captures the delta drift of a spot move that drags vol with it.
pub fn shadow_gamma(
    s: f64,
    k: f64,
    t: f64,
    r: f64,
    sigma: f64,
    right: OptionRight,
) -> (f64, f64) {
    let base = price(s, k, t, r, sigma, right).delta;

    let s_up = s * 1.01;
    let up = price(s_up, k, t, r, sigma * 1.05, right).delta;
    let shadow_up = (up - base) / (s_up - s);

    let s_down = s * 0.99;
    let down = price(s_down, k, t, r, sigma * 0.95, right).delta;
    let shadow_down = (base - down) / (s - s_down);

    (shadow_up, shadow_down)
}

/// Skew gamma (vomma): ∂Vega/∂σ by central difference across σ·(1±0.001).
pub fn skew_gamma(s: f64, k: f64, t: f64, r: f64, sigma: f64, right: OptionRight) -> f64 {
    let bump = sigma * 0.001;
    if bump <= 0.0 {
        return 0.0;
    }
    let up = price(s, k, t, r, sigma + bump, right).vega;
    let down = price(s, k, t, r, sigma - bump, right).vega;
    (up - down) / (2.0 * bump)
}
