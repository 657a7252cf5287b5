// Kou jump-diffusion: double-exponential jumps over a GBM backbone

use log::warn;
use num_complex::Complex64;

use crate::market::OptionRight;
use crate::math::rng::SplitMix64;
use crate::models::{bsm, fourier};

/// Kou parameters. Invariants: σ>0, λ≥0, p∈[0,1], η1>1 (finite
/// exponential moment), η2>0.
#[derive(Debug, Clone, Copy)]
pub struct KouParams {
    /// Diffusion volatility (annualized); cells may override it.
    pub sigma: f64,
    /// Jump intensity per year.
    pub lambda: f64,
    /// Probability that a jump is upward.
    pub p_up: f64,
    /// Rate of the upward exponential (mean up-jump 1/η1).
    pub eta1: f64,
    /// Rate of the downward exponential (mean down-jump 1/η2).
    pub eta2: f64,
}

impl KouParams {
    /// Defaults when the history cannot support jump identification.
    pub fn fallback() -> Self {
        KouParams {
            sigma: 0.2,
            lambda: 1.0,
            p_up: 0.4,
            eta1: 25.0,
            eta2: 25.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sigma > 0.0
            && self.lambda >= 0.0
            && (0.0..=1.0).contains(&self.p_up)
            && self.eta1 > 1.0
            && self.eta2 > 0.0
            && [self.sigma, self.lambda, self.p_up, self.eta1, self.eta2]
                .iter()
                .all(|x| x.is_finite())
    }

    /// E[e^J] − 1 for the double-exponential jump law; finite because
    /// η1 > 1.
    pub fn jump_compensator(&self) -> f64 {
        self.p_up * self.eta1 / (self.eta1 - 1.0)
            + (1.0 - self.p_up) * self.eta2 / (self.eta2 + 1.0)
            - 1.0
    }
}

/// Calibrated Kou model.
#[derive(Debug, Clone)]
pub struct KouModel {
    pub params: KouParams,
    pub fallback: bool,
    /// λ multiplier for sensitivity sweeps (1, 2 or 3).
    pub scale: u32,
}

impl KouModel {
    pub fn new(params: KouParams) -> Self {
        KouModel {
            params,
            fallback: false,
            scale: 1,
        }
    }

    /// Same parameters with the jump intensity scaled by `scale`.
    pub fn scaled(&self, scale: u32) -> Self {
        KouModel {
            params: self.params,
            fallback: self.fallback,
            scale,
        }
    }

    fn lambda(&self) -> f64 {
        self.params.lambda * self.scale as f64
    }

    fn sample_jump(&self, rng: &mut SplitMix64) -> f64 {
        if rng.next_uniform() < self.params.p_up {
            rng.next_exp(self.params.eta1)
        } else {
            -rng.next_exp(self.params.eta2)
        }
    }

    /// Terminal price under compensated drift; `sigma` overrides the
    /// calibrated diffusion vol for per-cell runs.
    pub fn simulate_terminal(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        steps: usize,
        sigma: Option<f64>,
        rng: &mut SplitMix64,
    ) -> f64 {
        let sig = sigma.unwrap_or(self.params.sigma);
        let lambda = self.lambda();
        let zeta = self.params.jump_compensator();
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();
        let drift = (rate - lambda * zeta - 0.5 * sig * sig) * dt;

        let mut log_s = s0.ln();
        for _ in 0..steps.max(1) {
            log_s += drift + sig * sqrt_dt * rng.next_normal();
            let jumps = rng.next_poisson(lambda * dt);
            for _ in 0..jumps {
                log_s += self.sample_jump(rng);
            }
        }
        log_s.exp()
    }

    /// Full price path, `steps`+1 points including S0.
    pub fn simulate_path(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        steps: usize,
        sigma: Option<f64>,
        rng: &mut SplitMix64,
    ) -> Vec<f64> {
        let sig = sigma.unwrap_or(self.params.sigma);
        let lambda = self.lambda();
        let zeta = self.params.jump_compensator();
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();
        let drift = (rate - lambda * zeta - 0.5 * sig * sig) * dt;

        let mut prices = Vec::with_capacity(steps + 1);
        let mut log_s = s0.ln();
        prices.push(s0);
        for _ in 0..steps {
            log_s += drift + sig * sqrt_dt * rng.next_normal();
            let jumps = rng.next_poisson(lambda * dt);
            for _ in 0..jumps {
                log_s += self.sample_jump(rng);
            }
            prices.push(log_s.exp());
        }
        prices
    }

    /// Terminal price under an external variance path (Heston overlay).
    pub fn simulate_terminal_with_variance(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        variance_path: &[f64],
        rng: &mut SplitMix64,
    ) -> f64 {
        if variance_path.is_empty() {
            return self.simulate_terminal(s0, rate, tau, 1, None, rng);
        }
        let lambda = self.lambda();
        let zeta = self.params.jump_compensator();
        let dt = tau / variance_path.len() as f64;
        let sqrt_dt = dt.sqrt();

        let mut log_s = s0.ln();
        for &v in variance_path {
            let v = v.max(0.0);
            log_s += (rate - lambda * zeta - 0.5 * v) * dt + v.sqrt() * sqrt_dt * rng.next_normal();
            let jumps = rng.next_poisson(lambda * dt);
            for _ in 0..jumps {
                log_s += self.sample_jump(rng);
            }
        }
        log_s.exp()
    }

    /// Characteristic function of ln S_T, fed to the Carr-Madan pricer.
    fn characteristic_fn(&self, u: Complex64, s0: f64, rate: f64, tau: f64) -> Complex64 {
        let p = &self.params;
        let i = Complex64::i();
        let lambda = self.lambda();
        let sig2 = p.sigma * p.sigma;
        let zeta = p.jump_compensator();

        let jump_cf = p.p_up * p.eta1 / (p.eta1 - i * u)
            + (1.0 - p.p_up) * p.eta2 / (p.eta2 + i * u)
            - 1.0;
        let psi = -0.5 * sig2 * u * u + lambda * jump_cf;
        let drift = s0.ln() + (rate - 0.5 * sig2 - lambda * zeta) * tau;
        (i * u * drift + tau * psi).exp()
    }

    /// European price via the shared Carr-Madan FFT; BSM fallback when the
    /// transform degenerates.
    pub fn option_price(
        &self,
        s0: f64,
        strike: f64,
        rate: f64,
        tau: f64,
        right: OptionRight,
    ) -> f64 {
        let cf = |u: Complex64| self.characteristic_fn(u, s0, rate, tau);
        let price = match right {
            OptionRight::Call => fourier::call_price(cf, s0, strike, rate, tau),
            OptionRight::Put => fourier::put_price(cf, s0, strike, rate, tau),
        };
        price.unwrap_or_else(|| bsm::price(s0, strike, tau, rate, self.params.sigma, right).price)
    }

    /// Identify jumps as daily log returns beyond three standard
    /// deviations; λ from their annualized frequency, p from the sign
    /// ratio, η1/η2 from the reciprocal mean jump sizes, σ from the
    /// remaining (non-jump) returns.
    pub fn calibrate(daily_returns: &[f64]) -> KouModel {
        const MIN_SAMPLES: usize = 30;
        if daily_returns.len() < MIN_SAMPLES {
            warn!(
                "kou calibration skipped: only {} returns",
                daily_returns.len()
            );
            return KouModel {
                params: KouParams::fallback(),
                fallback: true,
                scale: 1,
            };
        }

        let n = daily_returns.len() as f64;
        let mean = daily_returns.iter().sum::<f64>() / n;
        let std = (daily_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0))
            .sqrt();
        let threshold = 3.0 * std;

        let (mut ups, mut downs) = (Vec::new(), Vec::new());
        let mut diffusion = Vec::new();
        for &r in daily_returns {
            if (r - mean).abs() > threshold {
                if r > mean {
                    ups.push(r - mean);
                } else {
                    downs.push((r - mean).abs());
                }
            } else {
                diffusion.push(r);
            }
        }

        let jump_count = ups.len() + downs.len();
        let years = n / 252.0;
        let lambda = jump_count as f64 / years.max(1.0 / 252.0);
        let p_up = if jump_count > 0 {
            ups.len() as f64 / jump_count as f64
        } else {
            0.5
        };
        // η from mean jump size, floored so the exponential moment exists
        let eta1 = if ups.is_empty() {
            KouParams::fallback().eta1
        } else {
            (ups.len() as f64 / ups.iter().sum::<f64>()).max(1.01)
        };
        let eta2 = if downs.is_empty() {
            KouParams::fallback().eta2
        } else {
            (downs.len() as f64 / downs.iter().sum::<f64>()).max(0.01)
        };

        let dn = diffusion.len() as f64;
        let dmean = diffusion.iter().sum::<f64>() / dn.max(1.0);
        let dvar = diffusion.iter().map(|r| (r - dmean).powi(2)).sum::<f64>() / (dn - 1.0).max(1.0);
        let sigma = (dvar * 252.0).sqrt().max(1e-4);

        let params = KouParams {
            sigma,
            lambda,
            p_up,
            eta1,
            eta2,
        };
        if params.is_valid() {
            KouModel::new(params)
        } else {
            warn!("kou calibration produced invalid parameters, using fallback");
            KouModel {
                params: KouParams::fallback(),
                fallback: true,
                scale: 1,
            }
        }
    }
}
