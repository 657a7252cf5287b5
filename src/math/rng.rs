// SplitMix64 pseudo-random generator and the per-worker generator pool

use std::f64::consts::PI;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// SplitMix64 pseudo-random number generator.
///
/// Period 2^64, strong avalanche (adjacent seeds produce uncorrelated
/// streams), passes BigCrush / PractRand. Small enough to hand one
/// generator to each Monte-Carlo worker.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        SplitMix64 { state: seed }
    }

    /// Advance state and return a 64-bit pseudo-random integer.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Uniform in (0, 1). Upper 53 bits for full mantissa precision; the
    /// epsilon offset keeps ln(u) in Box-Muller finite.
    #[inline]
    pub fn next_uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64) + f64::EPSILON
    }

    /// Standard normal via Box-Muller.
    #[inline]
    pub fn next_normal(&mut self) -> f64 {
        let u1 = self.next_uniform();
        let u2 = self.next_uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Pair of standard normals with correlation `rho`.
    pub fn next_correlated_normals(&mut self, rho: f64) -> (f64, f64) {
        let z1 = self.next_normal();
        let z2 = self.next_normal();
        (z1, rho * z1 + (1.0 - rho * rho).sqrt() * z2)
    }

    /// Exponential with rate `lambda` by inverse transform.
    #[inline]
    pub fn next_exp(&mut self, lambda: f64) -> f64 {
        -self.next_uniform().ln() / lambda
    }

    /// Poisson count with the given mean. Knuth's product method for small
    /// means, normal approximation beyond 30 where the product underflows.
    pub fn next_poisson(&mut self, mean: f64) -> u64 {
        if mean <= 0.0 {
            return 0;
        }
        if mean > 30.0 {
            let x = mean + mean.sqrt() * self.next_normal();
            return x.max(0.0).round() as u64;
        }
        let limit = (-mean).exp();
        let mut k = 0u64;
        let mut p = 1.0;
        loop {
            p *= self.next_uniform();
            if p <= limit {
                return k;
            }
            k += 1;
        }
    }
}

/// Process-wide pool of independent generators.
///
/// Workers borrow one generator per simulation cell and return it on every
/// exit path (the guard's Drop). Generators never cross a worker boundary
/// mid-sequence; each is seeded from a single entropy seed through a
/// dedicated seeding stream.
pub struct RngPool {
    generators: Mutex<Vec<SplitMix64>>,
}

impl RngPool {
    /// Pool of `size` generators derived from `seed`.
    pub fn with_seed(size: usize, seed: u64) -> Self {
        let mut seeder = SplitMix64::new(seed);
        let generators = (0..size.max(1))
            .map(|_| SplitMix64::new(seeder.next_u64()))
            .collect();
        RngPool {
            generators: Mutex::new(generators),
        }
    }

    /// Pool seeded from the system clock.
    pub fn from_entropy(size: usize) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e3779b97f4a7c15);
        Self::with_seed(size, seed)
    }

    /// Borrow a generator for the duration of one simulation cell.
    /// Falls back to spawning a fresh stream if the pool momentarily runs
    /// dry (more concurrent borrowers than pool slots).
    pub fn acquire(&self) -> PooledRng<'_> {
        let rng = {
            let mut pool = self.generators.lock().unwrap_or_else(|e| e.into_inner());
            pool.pop()
        };
        let rng = rng.unwrap_or_else(|| {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1);
            SplitMix64::new(seed ^ 0xd1b54a32d192ed03)
        });
        PooledRng {
            pool: self,
            rng: Some(rng),
        }
    }
}

/// Scoped borrow of a pool generator; returns it on drop.
pub struct PooledRng<'a> {
    pool: &'a RngPool,
    rng: Option<SplitMix64>,
}

impl PooledRng<'_> {
    pub fn rng(&mut self) -> &mut SplitMix64 {
        self.rng.as_mut().expect("generator present until drop")
    }
}

impl Drop for PooledRng<'_> {
    fn drop(&mut self) {
        if let Some(rng) = self.rng.take() {
            let mut pool = self
                .pool
                .generators
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            pool.push(rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_mean_near_half() {
        let mut rng = SplitMix64::new(42);
        let n = 10_000;
        let mean: f64 = (0..n).map(|_| rng.next_uniform()).sum::<f64>() / n as f64;
        assert!((mean - 0.5).abs() < 0.02);
    }

    #[test]
    fn normal_moments() {
        let mut rng = SplitMix64::new(7);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.next_normal()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }

    #[test]
    fn poisson_mean_tracks_parameter() {
        let mut rng = SplitMix64::new(99);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| rng.next_poisson(3.0) as f64).sum::<f64>() / n as f64;
        assert!((mean - 3.0).abs() < 0.1);
    }

    #[test]
    fn pool_returns_generators_on_drop() {
        let pool = RngPool::with_seed(2, 123);
        {
            let mut a = pool.acquire();
            let mut b = pool.acquire();
            a.rng().next_u64();
            b.rng().next_u64();
            // Pool exhausted; a third borrow still works via a fresh stream
            let mut c = pool.acquire();
            c.rng().next_u64();
        }
        // All three returned; two original plus the spawned one
        assert!(pool.generators.lock().unwrap().len() >= 2);
    }

    #[test]
    fn distinct_seeds_distinct_streams() {
        let mut a = SplitMix64::new(1);
        let mut b = SplitMix64::new(2);
        let same = (0..100).filter(|_| a.next_u64() == b.next_u64()).count();
        assert_eq!(same, 0);
    }
}
