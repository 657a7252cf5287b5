// Heston stochastic-volatility model: simulation, pricing, calibration

use log::warn;
use num_complex::Complex64;

use crate::market::OptionRight;
use crate::math::integrate::trapezoid;
use crate::math::nelder_mead::{NelderMead, NelderMeadConfig};
use crate::math::rng::SplitMix64;
use crate::models::bsm;
use crate::models::CalibrationQuote;

/// Heston parameters. Invariants: κ>0, θ>0, ξ>0, V0≥0, |ρ|<1.
#[derive(Debug, Clone, Copy)]
pub struct HestonParams {
    pub v0: f64,
    pub kappa: f64,
    pub theta: f64,
    pub xi: f64,
    pub rho: f64,
}

impl HestonParams {
    /// Documented defaults used when calibration fails.
    pub fn fallback() -> Self {
        HestonParams {
            v0: 0.04,
            kappa: 2.0,
            theta: 0.04,
            xi: 0.4,
            rho: -0.5,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kappa > 0.0
            && self.theta > 0.0
            && self.xi > 0.0
            && self.v0 >= 0.0
            && self.rho.abs() < 1.0
            && [self.v0, self.kappa, self.theta, self.xi, self.rho]
                .iter()
                .all(|x| x.is_finite())
    }
}

/// Calibrated Heston model.
#[derive(Debug, Clone)]
pub struct HestonModel {
    pub params: HestonParams,
    pub fallback: bool,
}

impl HestonModel {
    pub fn new(params: HestonParams) -> Self {
        HestonModel {
            params,
            fallback: false,
        }
    }

    /// Euler-Maruyama with full truncation: the variance enters drift and
    /// diffusion as max(v, 0), which keeps paths finite under a Feller
    /// breach. `v_start` overrides V0 so Monte-Carlo cells can inject a
    /// per-cell volatility input.
    pub fn simulate_terminal(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        steps: usize,
        v_start: Option<f64>,
        rng: &mut SplitMix64,
    ) -> f64 {
        let p = &self.params;
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();

        let mut s = s0;
        let mut v = v_start.unwrap_or(p.v0).max(0.0);
        for _ in 0..steps.max(1) {
            let (z_s, z_v) = rng.next_correlated_normals(p.rho);
            let v_plus = v.max(0.0);
            let sqrt_v = v_plus.sqrt();
            s *= ((rate - 0.5 * v_plus) * dt + sqrt_v * sqrt_dt * z_s).exp();
            v += p.kappa * (p.theta - v_plus) * dt + p.xi * sqrt_v * sqrt_dt * z_v;
        }
        s
    }

    /// Full price path, `steps`+1 points including S0.
    pub fn simulate_path(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        steps: usize,
        v_start: Option<f64>,
        rng: &mut SplitMix64,
    ) -> Vec<f64> {
        let p = &self.params;
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();

        let mut prices = Vec::with_capacity(steps + 1);
        let mut s = s0;
        let mut v = v_start.unwrap_or(p.v0).max(0.0);
        prices.push(s);

        for _ in 0..steps {
            let (z_s, z_v) = rng.next_correlated_normals(p.rho);
            let v_plus = v.max(0.0);
            let sqrt_v = v_plus.sqrt();
            s *= ((rate - 0.5 * v_plus) * dt + sqrt_v * sqrt_dt * z_s).exp();
            v += p.kappa * (p.theta - v_plus) * dt + p.xi * sqrt_v * sqrt_dt * z_v;
            prices.push(s);
        }
        prices
    }

    /// Variance path only, for composing a jump model under Heston-driven
    /// variance. Full truncation as in `simulate_path`.
    pub fn simulate_variance_path(
        &self,
        tau: f64,
        steps: usize,
        v_start: Option<f64>,
        rng: &mut SplitMix64,
    ) -> Vec<f64> {
        let p = &self.params;
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();

        let mut vars = Vec::with_capacity(steps);
        let mut v = v_start.unwrap_or(p.v0).max(0.0);
        for _ in 0..steps {
            let v_plus = v.max(0.0);
            vars.push(v_plus);
            let z_v = rng.next_normal();
            v += p.kappa * (p.theta - v_plus) * dt + p.xi * v_plus.sqrt() * sqrt_dt * z_v;
        }
        vars
    }

    /// Semi-analytical European price via the two characteristic-function
    /// probabilities P1/P2. Falls back to BSM at σ=√V0 when the integrals
    /// degenerate.
    pub fn option_price(
        &self,
        s0: f64,
        strike: f64,
        rate: f64,
        tau: f64,
        right: OptionRight,
    ) -> f64 {
        if tau <= 0.0 || s0 <= 0.0 || strike <= 0.0 {
            return bsm::price(s0, strike, tau, rate, self.params.v0.sqrt(), right).price;
        }

        let p1 = self.probability(s0, strike, rate, tau, 1);
        let p2 = self.probability(s0, strike, rate, tau, 2);

        let discount = (-rate * tau).exp();
        let call = s0 * p1.clamp(0.0, 1.0) - strike * discount * p2.clamp(0.0, 1.0);

        let call = if call.is_finite() && call >= 0.0 {
            call
        } else {
            bsm::price(s0, strike, tau, rate, self.params.v0.sqrt(), OptionRight::Call).price
        };

        match right {
            OptionRight::Call => call,
            // Put-call parity
            OptionRight::Put => (call - s0 + strike * discount).max(0.0),
        }
    }

    fn probability(&self, s0: f64, strike: f64, rate: f64, tau: f64, j: i32) -> f64 {
        let integral = trapezoid(
            |u| self.probability_integrand(u, s0, strike, rate, tau, j),
            1e-3,
            100.0,
            2000,
        );
        0.5 + integral / std::f64::consts::PI
    }

    fn probability_integrand(
        &self,
        u: f64,
        s0: f64,
        strike: f64,
        rate: f64,
        tau: f64,
        j: i32,
    ) -> f64 {
        let i = Complex64::i();
        let phi = Complex64::new(u, 0.0);
        let cf = self.characteristic_fn(phi, s0, rate, tau, j);
        let value = ((-i * phi * strike.ln()).exp() * cf / (i * phi)).re;
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Heston characteristic function for probability P_j in the
    /// branch-cut-stable ("little trap") form.
    fn characteristic_fn(
        &self,
        phi: Complex64,
        s0: f64,
        rate: f64,
        tau: f64,
        j: i32,
    ) -> Complex64 {
        let p = &self.params;
        let i = Complex64::i();

        let (u_j, b_j) = if j == 1 {
            (0.5, p.kappa - p.rho * p.xi)
        } else {
            (-0.5, p.kappa)
        };
        let a = p.kappa * p.theta;
        let xi2 = p.xi * p.xi;

        let beta = b_j - p.rho * p.xi * phi * i;
        let d = (beta * beta - xi2 * (2.0 * u_j * phi * i - phi * phi)).sqrt();

        let g_denominator = beta + d;
        if g_denominator.norm() < 1e-14 {
            return Complex64::new(1.0, 0.0);
        }
        let g = (beta - d) / g_denominator;

        let exp_dt = if (d * tau).re.abs() > 700.0 {
            Complex64::new(0.0, 0.0)
        } else {
            (-d * tau).exp()
        };
        let one_minus_g_exp = 1.0 - g * exp_dt;
        if one_minus_g_exp.norm() < 1e-14 || (1.0 - g).norm() < 1e-14 {
            return Complex64::new(1.0, 0.0);
        }

        let c_term = (a / xi2) * ((beta - d) * tau - 2.0 * (one_minus_g_exp / (1.0 - g)).ln());
        let d_term = ((beta - d) / xi2) * ((1.0 - exp_dt) / one_minus_g_exp);

        let exponent = i * phi * (s0.ln() + rate * tau) + c_term + d_term * p.v0;
        let result = exponent.exp();
        if result.is_finite() {
            result
        } else {
            Complex64::new(1.0, 0.0)
        }
    }

    /// Calibrate by Nelder-Mead on squared market-vs-model price error.
    /// Non-convergence or invalid output recovers the documented fallback
    /// parameters with the `fallback` flag set.
    pub fn calibrate(
        spot: f64,
        rate: f64,
        quotes: &[CalibrationQuote],
        seed: HestonParams,
        nm_config: NelderMeadConfig,
    ) -> HestonModel {
        if quotes.is_empty() {
            warn!("heston calibration skipped: no usable quotes");
            return HestonModel {
                params: HestonParams::fallback(),
                fallback: true,
            };
        }

        let objective = |x: &[f64]| -> f64 {
            let trial = HestonParams {
                v0: x[0],
                kappa: x[1],
                theta: x[2],
                xi: x[3],
                rho: x[4],
            };
            if !bounds_ok(&trial) {
                return 1e10;
            }
            let model = HestonModel::new(trial);
            let mut error = 0.0;
            for quote in quotes {
                let price = model.option_price(spot, quote.strike, rate, quote.tau, quote.right);
                if !price.is_finite() {
                    return 1e10;
                }
                error += (price - quote.mid).powi(2);
            }
            error
        };

        let start = vec![seed.v0, seed.kappa, seed.theta, seed.xi, seed.rho];
        let result = NelderMead::new(nm_config).minimize(objective, start);

        let fitted = HestonParams {
            v0: result.best_params[0],
            kappa: result.best_params[1],
            theta: result.best_params[2],
            xi: result.best_params[3],
            rho: result.best_params[4],
        };

        if result.best_value.is_finite() && result.best_value < 1e9 && fitted.is_valid() {
            HestonModel {
                params: fitted,
                fallback: false,
            }
        } else {
            warn!(
                "heston calibration failed (objective {:.3e}), using fallback parameters",
                result.best_value
            );
            HestonModel {
                params: HestonParams::fallback(),
                fallback: true,
            }
        }
    }
}

fn bounds_ok(p: &HestonParams) -> bool {
    p.v0 >= 1e-4
        && p.v0 <= 4.0
        && p.kappa >= 0.01
        && p.kappa <= 20.0
        && p.theta >= 1e-4
        && p.theta <= 4.0
        && p.xi >= 0.01
        && p.xi <= 3.0
        && p.rho > -0.999
        && p.rho < 0.999
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_params() -> HestonParams {
        // ξ small, v0=θ: effectively constant vol at 20%
        HestonParams {
            v0: 0.04,
            kappa: 1.0,
            theta: 0.04,
            xi: 0.01,
            rho: 0.0,
        }
    }

    #[test]
    fn near_constant_vol_matches_bsm() {
        let model = HestonModel::new(flat_params());
        let price = model.option_price(100.0, 100.0, 0.05, 0.25, OptionRight::Call);
        let reference = bsm::price(100.0, 100.0, 0.25, 0.05, 0.2, OptionRight::Call).price;
        assert!(
            (price - reference).abs() < 0.05,
            "heston {} vs bsm {}",
            price,
            reference
        );
    }

    #[test]
    fn analytic_put_call_parity() {
        let model = HestonModel::new(HestonParams::fallback());
        let call = model.option_price(100.0, 95.0, 0.03, 0.5, OptionRight::Call);
        let put = model.option_price(100.0, 95.0, 0.03, 0.5, OptionRight::Put);
        let parity = 100.0 - 95.0 * (-0.03f64 * 0.5).exp();
        assert!((call - put - parity).abs() < 1e-2);
    }

    #[test]
    fn terminal_mean_is_forward() {
        let model = HestonModel::new(HestonParams::fallback());
        let mut rng = SplitMix64::new(42);
        let n = 4000;
        let mean: f64 = (0..n)
            .map(|_| model.simulate_terminal(100.0, 0.05, 0.5, 126, None, &mut rng))
            .sum::<f64>()
            / n as f64;
        let forward = 100.0 * (0.05f64 * 0.5).exp();
        assert!(
            (mean - forward).abs() / forward < 0.02,
            "mean {} vs forward {}",
            mean,
            forward
        );
    }

    #[test]
    fn variance_path_stays_non_negative() {
        // Strong Feller breach: ξ² >> 2κθ
        let model = HestonModel::new(HestonParams {
            v0: 0.02,
            kappa: 0.5,
            theta: 0.02,
            xi: 1.5,
            rho: -0.9,
        });
        let mut rng = SplitMix64::new(7);
        for v in model.simulate_variance_path(1.0, 252, None, &mut rng) {
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn calibration_fallback_on_empty_quotes() {
        let model = HestonModel::calibrate(
            100.0,
            0.05,
            &[],
            HestonParams::fallback(),
            NelderMeadConfig::default(),
        );
        assert!(model.fallback);
        assert!((model.params.kappa - 2.0).abs() < 1e-12);
    }
}
