//! Percentile-weighted sampling without replacement.
//!
//! Candidates arrive ranked most popular first. Every draw assigns each
//! remaining candidate a weight from its percentile position in the remaining
//! pool, so the least viewed tenth is 512 times as likely to be picked as the
//! most viewed tenth. Weights are recomputed after every removal because the
//! percentiles shift as the pool shrinks.

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of uniform draws in `[0, 1)`.
pub trait UniformSource {
    fn next_unit(&mut self) -> f64;
}

/// Adapter exposing any [`rand::Rng`] as a [`UniformSource`].
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> UniformSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

impl RngSource<StdRng> {
    /// Non-reproducible source seeded from the OS.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Weight for the candidate at `index` in a pool of `len` remaining candidates.
#[must_use]
pub fn percentile_weight(index: usize, len: usize) -> u32 {
    #[allow(clippy::cast_precision_loss)]
    let percentile = index as f64 / len as f64;
    match percentile {
        p if p <= 0.1 => 1,
        p if p <= 0.2 => 2,
        p if p <= 0.3 => 4,
        p if p <= 0.4 => 8,
        p if p <= 0.5 => 16,
        p if p <= 0.6 => 32,
        p if p <= 0.7 => 64,
        p if p <= 0.8 => 128,
        p if p <= 0.9 => 256,
        _ => 512,
    }
}

/// Index selected by `draw` from a pool of `len` candidates.
fn draw_index(len: usize, draw: f64) -> usize {
    let weights: Vec<u32> = (0..len).map(|i| percentile_weight(i, len)).collect();
    let total: f64 = weights.iter().map(|&w| f64::from(w)).sum();

    let mut cumulative = 0.0;
    for (index, &weight) in weights.iter().enumerate() {
        cumulative += f64::from(weight) / total;
        if draw <= cumulative {
            return index;
        }
    }
    // Rounding can leave the final cumulative value just under 1.0.
    len - 1
}

/// Draw up to `count` items from `ranked`, biased towards the tail.
///
/// Returns the items in draw order; callers re-rank if they need popularity
/// order. The input is left untouched.
pub fn weighted_sample<T: Clone>(
    ranked: &[T],
    count: usize,
    source: &mut dyn UniformSource,
) -> Vec<T> {
    let mut remaining = ranked.to_vec();
    let target = count.min(remaining.len());
    let mut picked = Vec::with_capacity(target);

    while picked.len() < target {
        let index = draw_index(remaining.len(), source.next_unit());
        picked.push(remaining.remove(index));
    }

    picked
}
