// Stochastic-model layer: BSM valuator plus the four calibrated processes
// behind a single dispatch enum

pub mod bsm;
pub mod cgmy;
pub mod fourier;
pub mod heston;
pub mod kou;
pub mod merton;

use serde::Serialize;

use crate::market::OptionRight;
use crate::math::rng::SplitMix64;
use cgmy::CgmyModel;
use heston::HestonModel;
use kou::KouModel;
use merton::MertonModel;

/// One market quote used as a calibration target.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationQuote {
    pub strike: f64,
    pub tau: f64,
    pub mid: f64,
    pub right: OptionRight,
}

/// Immutable snapshot of one model's parameters at scoring time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ParamsSnapshot {
    Heston {
        v0: f64,
        kappa: f64,
        theta: f64,
        xi: f64,
        rho: f64,
        fallback: bool,
    },
    Merton {
        sigma: f64,
        lambda: f64,
        mu: f64,
        delta: f64,
        fallback: bool,
    },
    Kou {
        sigma: f64,
        lambda: f64,
        p_up: f64,
        eta1: f64,
        eta2: f64,
        fallback: bool,
    },
    Cgmy {
        c: f64,
        g: f64,
        m: f64,
        y: f64,
        fallback: bool,
    },
}

/// The calibrated models for one pipeline run, owned by the driver and
/// lent read-only to workers. Replaces the process-wide mutable singleton
/// of older designs.
#[derive(Debug, Clone)]
pub struct CalibratedModels {
    pub heston: HestonModel,
    pub merton: MertonModel,
    pub kou: KouModel,
    pub cgmy: CgmyModel,
}

impl CalibratedModels {
    /// Snapshots for embedding into scored results.
    pub fn snapshots(&self) -> Vec<ParamsSnapshot> {
        vec![
            ParamsSnapshot::Heston {
                v0: self.heston.params.v0,
                kappa: self.heston.params.kappa,
                theta: self.heston.params.theta,
                xi: self.heston.params.xi,
                rho: self.heston.params.rho,
                fallback: self.heston.fallback,
            },
            ParamsSnapshot::Merton {
                sigma: self.merton.params.sigma,
                lambda: self.merton.params.lambda,
                mu: self.merton.params.mu,
                delta: self.merton.params.delta,
                fallback: self.merton.fallback,
            },
            ParamsSnapshot::Kou {
                sigma: self.kou.params.sigma,
                lambda: self.kou.params.lambda,
                p_up: self.kou.params.p_up,
                eta1: self.kou.params.eta1,
                eta2: self.kou.params.eta2,
                fallback: self.kou.fallback,
            },
            ParamsSnapshot::Cgmy {
                c: self.cgmy.params.c,
                g: self.cgmy.params.g,
                m: self.cgmy.params.m,
                y: self.cgmy.params.y,
                fallback: self.cgmy.fallback,
            },
        ]
    }

    /// The model set a Monte-Carlo fan-out runs per volatility input.
    /// Always the four base models plus the two Heston-variance overlays;
    /// the optional λ sweep adds scaled jump variants.
    pub fn simulation_set(&self, jump_scale_sweep: bool) -> Vec<StochasticModel> {
        let mut set = vec![
            StochasticModel::Heston(self.heston.clone()),
            StochasticModel::Merton(self.merton.clone()),
            StochasticModel::Kou(self.kou.clone()),
            StochasticModel::Cgmy(self.cgmy.clone()),
            StochasticModel::MertonHeston(self.merton.clone(), self.heston.clone()),
            StochasticModel::KouHeston(self.kou.clone(), self.heston.clone()),
        ];
        if jump_scale_sweep {
            for scale in [2u32, 3] {
                set.push(StochasticModel::Merton(self.merton.scaled(scale)));
                set.push(StochasticModel::Kou(self.kou.scaled(scale)));
            }
        }
        set
    }
}

/// Tagged dispatch over the stochastic processes. The capability set is
/// uniform: terminal simulation, path simulation, European pricing.
#[derive(Debug, Clone)]
pub enum StochasticModel {
    Heston(HestonModel),
    Merton(MertonModel),
    Kou(KouModel),
    Cgmy(CgmyModel),
    /// Merton jumps under a Heston-simulated variance path.
    MertonHeston(MertonModel, HestonModel),
    /// Kou jumps under a Heston-simulated variance path.
    KouHeston(KouModel, HestonModel),
}

impl StochasticModel {
    /// Stable name used in probability-map keys.
    pub fn name(&self) -> String {
        match self {
            StochasticModel::Heston(_) => "heston".into(),
            StochasticModel::Merton(m) if m.scale > 1 => format!("merton_x{}", m.scale),
            StochasticModel::Merton(_) => "merton".into(),
            StochasticModel::Kou(k) if k.scale > 1 => format!("kou_x{}", k.scale),
            StochasticModel::Kou(_) => "kou".into(),
            StochasticModel::Cgmy(_) => "cgmy".into(),
            StochasticModel::MertonHeston(..) => "merton_heston".into(),
            StochasticModel::KouHeston(..) => "kou_heston".into(),
        }
    }

    /// Resolve the per-cell volatility input once, before a batch of
    /// paths. CGMY rescales C (and rebuilds its jump table) so its
    /// variance rate matches σ²; the other models absorb σ per path.
    pub fn with_cell_vol(&self, sigma: f64) -> StochasticModel {
        match self {
            StochasticModel::Cgmy(c) => StochasticModel::Cgmy(c.with_target_vol(sigma)),
            other => other.clone(),
        }
    }

    /// One terminal price with the cell's volatility input `sigma`.
    /// Diffusive models take σ directly; Heston starts its variance at σ².
    /// CGMY ignores σ here; resolve it up front with `with_cell_vol`.
    pub fn simulate_terminal(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        steps: usize,
        sigma: f64,
        rng: &mut SplitMix64,
    ) -> f64 {
        match self {
            StochasticModel::Heston(h) => {
                h.simulate_terminal(s0, rate, tau, steps, Some(sigma * sigma), rng)
            }
            StochasticModel::Merton(m) => {
                m.simulate_terminal(s0, rate, tau, steps, Some(sigma), rng)
            }
            StochasticModel::Kou(k) => k.simulate_terminal(s0, rate, tau, steps, Some(sigma), rng),
            StochasticModel::Cgmy(c) => c.simulate_terminal(s0, rate, tau, steps, rng),
            StochasticModel::MertonHeston(m, h) => {
                let variance = h.simulate_variance_path(tau, steps, Some(sigma * sigma), rng);
                m.simulate_terminal_with_variance(s0, rate, tau, &variance, rng)
            }
            StochasticModel::KouHeston(k, h) => {
                let variance = h.simulate_variance_path(tau, steps, Some(sigma * sigma), rng);
                k.simulate_terminal_with_variance(s0, rate, tau, &variance, rng)
            }
        }
    }

    /// Full path with the cell's volatility input; overlay variants fall
    /// back to stepwise terminal composition of their jump model.
    pub fn simulate_path(
        &self,
        s0: f64,
        rate: f64,
        tau: f64,
        steps: usize,
        sigma: f64,
        rng: &mut SplitMix64,
    ) -> Vec<f64> {
        match self {
            StochasticModel::Heston(h) => {
                h.simulate_path(s0, rate, tau, steps, Some(sigma * sigma), rng)
            }
            StochasticModel::Merton(m) => m.simulate_path(s0, rate, tau, steps, Some(sigma), rng),
            StochasticModel::Kou(k) => k.simulate_path(s0, rate, tau, steps, Some(sigma), rng),
            StochasticModel::Cgmy(c) => c.simulate_path(s0, rate, tau, steps, rng),
            StochasticModel::MertonHeston(m, _) => {
                m.simulate_path(s0, rate, tau, steps, Some(sigma), rng)
            }
            StochasticModel::KouHeston(k, _) => {
                k.simulate_path(s0, rate, tau, steps, Some(sigma), rng)
            }
        }
    }

    /// European price under the calibrated parameters (no per-cell vol).
    pub fn option_price(
        &self,
        s0: f64,
        strike: f64,
        rate: f64,
        tau: f64,
        right: OptionRight,
    ) -> f64 {
        match self {
            StochasticModel::Heston(h) => h.option_price(s0, strike, rate, tau, right),
            StochasticModel::Merton(m) | StochasticModel::MertonHeston(m, _) => {
                m.option_price(s0, strike, rate, tau, right)
            }
            StochasticModel::Kou(k) | StochasticModel::KouHeston(k, _) => {
                k.option_price(s0, strike, rate, tau, right)
            }
            StochasticModel::Cgmy(c) => c.option_price(s0, strike, rate, tau, right),
        }
    }
}
