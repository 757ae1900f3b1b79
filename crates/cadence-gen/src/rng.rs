//! Seeded randomness and the sampling primitives every generator draws from.
//!
//! Each method consumes a fixed number of draws from the underlying source, so
//! the order of calls is part of a generator's output contract.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform integer in `[0, n)`; 0 when `n` is 0.
    pub fn below(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.inner.gen_range(0..n)
    }

    /// Uniform integer in `[lo, hi]`.
    pub fn between(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Random 64-bit salt.
    pub fn salt(&mut self) -> u64 {
        self.inner.gen::<u64>()
    }

    /// Inter-arrival time in hours of a Poisson process with `rate` events/hour.
    ///
    /// A non-positive rate never fires and returns infinity without drawing.
    pub fn exponential_hours(&mut self, rate: f64) -> f64 {
        if rate <= 0.0 {
            return f64::INFINITY;
        }
        let mut u = self.uniform();
        while u == 0.0 {
            u = self.uniform();
        }
        -u.ln() / rate
    }

    /// Standard normal variate (Box-Muller, two uniform draws).
    pub fn standard_normal(&mut self) -> f64 {
        let mut u1 = self.uniform();
        while u1 == 0.0 {
            u1 = self.uniform();
        }
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Right-skewed positive integer around `mean`, at least 1.
    ///
    /// A normal variate `N(mean, std_dev)` is squashed through
    /// `exp(x / (mean + 1))` and rescaled by `mean`, so the median sits near
    /// `mean * e` with a long upper tail.
    pub fn lognormal_magnitude(&mut self, mean: f64, std_dev: f64) -> u32 {
        let normal = self.standard_normal() * std_dev + mean;
        let value = (normal / (mean + 1.0)).exp() * mean;
        if value.is_finite() && value >= 1.0 {
            value.min(f64::from(u32::MAX)) as u32
        } else {
            1
        }
    }

    /// Lognormal duration in hours whose arithmetic mean and standard
    /// deviation match `mean_hours` and `std_hours`.
    pub fn lognormal_hours(&mut self, mean_hours: f64, std_hours: f64) -> f64 {
        if mean_hours <= 0.0 {
            return 0.0;
        }
        let variance_ratio = (std_hours / mean_hours).powi(2);
        let sigma2 = (1.0 + variance_ratio).ln();
        let mu = mean_hours.ln() - sigma2 / 2.0;
        (mu + sigma2.sqrt() * self.standard_normal()).exp()
    }

    /// Pick a key with probability proportional to its weight.
    ///
    /// Keys are walked in sorted order; negative weights count as zero. Falls
    /// back to the last key when rounding leaves `r` past the final boundary.
    pub fn weighted_choice<'a, K: Ord>(&mut self, weights: &'a BTreeMap<K, f64>) -> Option<&'a K> {
        let total: f64 = weights.values().map(|w| w.max(0.0)).sum();
        let r = self.uniform() * total;
        let mut cumulative = 0.0;
        for (key, weight) in weights {
            cumulative += weight.max(0.0);
            if r < cumulative {
                return Some(key);
            }
        }
        weights.keys().next_back()
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.below(items.len() as u32) as usize;
        items.get(idx)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }
}

/// Seed derived from the wall clock, for runs that need not be reproducible.
pub fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
