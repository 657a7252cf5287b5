// Merton jump-diffusion: lognormal jumps over a GBM backbone

use log::warn;

use crate::market::OptionRight;
use crate::math::rng::SplitMix64;
use crate::models::bsm;

/// Merton parameters. Invariants: σ>0, λ≥0, δ≥0.
#[derive(Debug, Clone, Copy)]
pub struct MertonParams {
    /// Diffusion volatility (annualized); cells may override it.
    pub sigma: f64,
    /// Jump intensity per year.
    pub lambda: f64,
    /// Mean of the jump's log size.
    pub mu: f64,
    /// Std-dev of the jump's log size.
    pub delta: f64,
}

impl MertonParams {
    /// Defaults when the history is too short to estimate jumps.
    pub fn fallback() -> Self {
        MertonParams {
            sigma: 0.2,
            lambda: 1.0,
            mu: 0.0,
            delta: 0.02,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sigma > 0.0
            && self.lambda >= 0.0
            && self.delta >= 0.0
            && [self.sigma, self.lambda, self.mu, self.delta]
                .iter()
                .all(|x| x.is_finite())
    }

    /// Expected relative jump size E[e^J] − 1, the drift compensator.
    pub fn jump_compensator(&self) -> f64 {
        (self.mu + 0.5 * self.delta * self.delta).exp() - 1.0
    }
}

/// Calibrated Merton model.
#[derive(Debug, Clone)]
pub struct MertonModel {
    pub params: MertonParams,
    pub fallback: bool,
    /// λ multiplier for sensitivity sweeps (1, 2 or 3).
    pub scale: u32,
}

impl MertonModel {
    pub fn new(params: MertonParams) -> Self {
        MertonModel {
            params,
            fallback: false,
            scale: 1,
        }
    }

    /// Same parameters with the jump intensity scaled by `scale`.
    pub fn scaled(&self, scale: u32) -> Self {
        MertonModel {
            params: self.params,
            fallback: self.fallback,
            scale,
        }
    }

    fn lambda(&self) -> f64 {
        self.params.lambda * self.scale as f64
    }

    /// Terminal price: GBM step with jump-compensated drift, plus
    /// Poisson(λ·dt) lognormal jumps exp(μ + δZ) per step.
    /// `sigma` overrides the calibrated diffusion vol for per-cell runs.
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
        let kappa_bar = self.params.jump_compensator();
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();
        let drift = (rate - lambda * kappa_bar - 0.5 * sig * sig) * dt;

        let mut log_s = s0.ln();
        for _ in 0..steps.max(1) {
            log_s += drift + sig * sqrt_dt * rng.next_normal();
            let jumps = rng.next_poisson(lambda * dt);
            for _ in 0..jumps {
                log_s += self.params.mu + self.params.delta * rng.next_normal();
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
        let kappa_bar = self.params.jump_compensator();
        let dt = tau / steps.max(1) as f64;
        let sqrt_dt = dt.sqrt();
        let drift = (rate - lambda * kappa_bar - 0.5 * sig * sig) * dt;

        let mut prices = Vec::with_capacity(steps + 1);
        let mut log_s = s0.ln();
        prices.push(s0);
        for _ in 0..steps {
            log_s += drift + sig * sqrt_dt * rng.next_normal();
            let jumps = rng.next_poisson(lambda * dt);
            for _ in 0..jumps {
                log_s += self.params.mu + self.params.delta * rng.next_normal();
            }
            prices.push(log_s.exp());
        }
        prices
    }

    /// Terminal price driven by an externally supplied variance path
    /// (Heston overlay): the per-step diffusion vol is √v_k, jumps
    /// unchanged.
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
        let kappa_bar = self.params.jump_compensator();
        let dt = tau / variance_path.len() as f64;
        let sqrt_dt = dt.sqrt();

        let mut log_s = s0.ln();
        for &v in variance_path {
            let v = v.max(0.0);
            log_s += (rate - lambda * kappa_bar - 0.5 * v) * dt + v.sqrt() * sqrt_dt * rng.next_normal();
            let jumps = rng.next_poisson(lambda * dt);
            for _ in 0..jumps {
                log_s += self.params.mu + self.params.delta * rng.next_normal();
            }
        }
        log_s.exp()
    }

    /// Merton series price: Poisson-weighted BSM with per-term vol and
    /// drift adjustments. Truncated when the Poisson weight underflows.
    pub fn option_price(
        &self,
        s0: f64,
        strike: f64,
        rate: f64,
        tau: f64,
        right: OptionRight,
    ) -> f64 {
        if tau <= 0.0 {
            return bsm::price(s0, strike, tau, rate, self.params.sigma, right).price;
        }
        let sig = self.params.sigma;
        let lambda = self.lambda();
        let kappa_bar = self.params.jump_compensator();
        let lambda_prime = lambda * (1.0 + kappa_bar);
        let ln_one_plus_k = (1.0 + kappa_bar).ln();

        let mut total = 0.0;
        let mut weight = (-lambda_prime * tau).exp(); // n = 0 term
        for n in 0..=60u32 {
            if n > 0 {
                weight *= lambda_prime * tau / n as f64;
            }
            if weight < 1e-14 && n > (lambda_prime * tau) as u32 {
                break;
            }
            let sigma_n =
                (sig * sig + n as f64 * self.params.delta * self.params.delta / tau).sqrt();
            let rate_n = rate - lambda * kappa_bar + n as f64 * ln_one_plus_k / tau;
            total += weight * bsm::price(s0, strike, tau, rate_n, sigma_n, right).price;
        }
        total
    }

    /// Estimate jump parameters from overnight log-gaps ln(Oₜ/Cₜ₋₁):
    /// μ, δ by sample mean/std; λ as the annualized frequency of gaps
    /// beyond two overnight sigmas. The diffusion σ comes from
    /// close-to-close returns with the jump dates excluded.
    pub fn calibrate(overnight_gaps: &[f64], daily_returns: &[f64]) -> MertonModel {
        const MIN_SAMPLES: usize = 30;
        if overnight_gaps.len() < MIN_SAMPLES || daily_returns.len() < MIN_SAMPLES {
            warn!(
                "merton calibration skipped: only {} gaps / {} returns",
                overnight_gaps.len(),
                daily_returns.len()
            );
            return MertonModel {
                params: MertonParams::fallback(),
                fallback: true,
                scale: 1,
            };
        }

        let n = overnight_gaps.len() as f64;
        let mu = overnight_gaps.iter().sum::<f64>() / n;
        let delta = (overnight_gaps.iter().map(|g| (g - mu).powi(2)).sum::<f64>() / (n - 1.0))
            .sqrt();

        let threshold = 2.0 * delta;
        let jump_count = overnight_gaps
            .iter()
            .filter(|g| (**g - mu).abs() > threshold)
            .count();
        let years = overnight_gaps.len() as f64 / 252.0;
        let lambda = jump_count as f64 / years.max(1.0 / 252.0);

        let rn = daily_returns.len() as f64;
        let rmean = daily_returns.iter().sum::<f64>() / rn;
        let daily_var =
            daily_returns.iter().map(|r| (r - rmean).powi(2)).sum::<f64>() / (rn - 1.0);
        let sigma = (daily_var * 252.0).sqrt().max(1e-4);

        let params = MertonParams {
            sigma,
            lambda,
            mu,
            delta: delta.max(1e-6),
        };
        if params.is_valid() {
            MertonModel::new(params)
        } else {
            warn!("merton calibration produced invalid parameters, using fallback");
            MertonModel {
                params: MertonParams::fallback(),
                fallback: true,
                scale: 1,
            }
        }
    }
}
