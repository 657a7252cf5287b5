// Local-volatility surface: (strike, time) → implied vol with bilinear lookup

use chrono::NaiveDate;

use crate::market::OptionChain;

/// Implied-vol grid over a sorted strike axis and a time axis in years.
/// A zero cell means "no datum"; interpolation treats it like any other
/// value, matching the assembled-grid semantics.
#[derive(Debug, Clone, Default)]
pub struct VolSurface {
    strikes: Vec<f64>,
    times: Vec<f64>,
    /// grid[time_idx][strike_idx]
    grid: Vec<Vec<f64>>,
}

impl VolSurface {
    /// Assemble the surface from a chain as of `today`. Per expiration with
    /// positive time-to-maturity: mid IVs ((bid_iv+ask_iv)/2) with positive
    /// value, keyed by strike; rows are padded onto the union strike axis by
    /// carrying the nearest known IV (first known for leading gaps, last
    /// known for trailing).
    pub fn build(chain: &OptionChain, today: NaiveDate) -> Self {
        let mut times = Vec::new();
        let mut rows: Vec<Vec<(f64, f64)>> = Vec::new();

        for expiration in chain.expirations() {
            let dte = (expiration - today).num_days();
            if dte <= 0 {
                continue;
            }
            let t = dte as f64 / 365.0;

            let mut row: Vec<(f64, f64)> = chain
                .contracts(expiration)
                .iter()
                .filter_map(|c| {
                    let iv = (c.greeks.bid_iv + c.greeks.ask_iv) / 2.0;
                    (iv > 0.0 && c.strike > 0.0).then_some((c.strike, iv))
                })
                .collect();
            if row.is_empty() {
                continue;
            }
            row.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            // Collapse duplicate strikes (both rights quote the same strike)
            row.dedup_by(|b, a| {
                if (a.0 - b.0).abs() < 1e-9 {
                    a.1 = (a.1 + b.1) / 2.0;
                    true
                } else {
                    false
                }
            });

            times.push(t);
            rows.push(row);
        }

        if rows.is_empty() {
            return VolSurface::default();
        }

        // Union strike axis
        let mut strikes: Vec<f64> = rows.iter().flatten().map(|&(k, _)| k).collect();
        strikes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        strikes.dedup_by(|b, a| (*a - *b).abs() < 1e-9);

        // Pad each expiration row onto the union axis
        let grid = rows
            .iter()
            .map(|row| {
                strikes
                    .iter()
                    .map(|&k| {
                        // Nearest known IV at or below k, else the first known
                        match row.iter().rev().find(|&&(rk, _)| rk <= k + 1e-9) {
                            Some(&(_, iv)) => iv,
                            None => row[0].1,
                        }
                    })
                    .collect()
            })
            .collect();

        VolSurface {
            strikes,
            times,
            grid,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Bilinear interpolation between the four surrounding cells; outside
    /// the hull the nearest edge value is returned. Empty surface → 0.
    pub fn interpolate(&self, strike: f64, t: f64) -> f64 {
        if self.grid.is_empty() {
            return 0.0;
        }

        let (i0, i1, wt) = bracket(&self.times, t);
        let (j0, j1, wk) = bracket(&self.strikes, strike);

        let v00 = self.grid[i0][j0];
        let v01 = self.grid[i0][j1];
        let v10 = self.grid[i1][j0];
        let v11 = self.grid[i1][j1];

        let low = v00 + (v01 - v00) * wk;
        let high = v10 + (v11 - v10) * wk;
        low + (high - low) * wt
    }

    /// Mean of the non-zero cells; 0 when none.
    pub fn mean_iv(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for row in &self.grid {
            for &v in row {
                if v > 0.0 {
                    sum += v;
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Bracketing indices and interpolation weight for `x` on a sorted axis.
/// Clamps outside the axis so callers get nearest-edge behavior.
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    let n = axis.len();
    if n == 1 || x <= axis[0] {
        return (0, 0, 0.0);
    }
    if x >= axis[n - 1] {
        return (n - 1, n - 1, 0.0);
    }
    let hi = axis.partition_point(|&a| a <= x);
    let lo = hi - 1;
    let span = axis[hi] - axis[lo];
    let w = if span > 0.0 { (x - axis[lo]) / span } else { 0.0 };
    (lo, hi, w)
}
