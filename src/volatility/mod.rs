// Volatility layer: historical estimators and the local-vol surface

pub mod historical;
pub mod surface;

pub use historical::{estimate_windows, Estimator, WindowedVols, CANONICAL_WINDOWS};
pub use surface::VolSurface;
