//! # Random Selection Helpers
//!
//! Seeded random sources and the biased sampling used by level generation.
//!
//! Nothing in the crate touches an ambient generator: every algorithm takes a
//! caller-supplied `Rng`, so seeded runs are reproducible.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Creates a seeded random number generator.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Samples an index in `min..max` biased toward `min`.
///
/// Draws `x` uniformly from `[0, 1)` and maps it through
/// `y = 1 - (1 / (x + 1))^weight`, so `y` lies in `[0, 1 - 2^-weight)`.
/// Larger weights spread selection further toward `max`; a weight of zero
/// always returns `min`. The result is clamped into the range.
///
/// # Examples
///
/// ```
/// use raidcore::utils::{create_rng, sample_pareto_index};
///
/// let mut rng = create_rng(7);
/// let index = sample_pareto_index(&mut rng, 0, 10, 2.0);
/// assert!(index < 10);
/// ```
pub fn sample_pareto_index<R: Rng + ?Sized>(rng: &mut R, min: usize, max: usize, weight: f64) -> usize {
    if max <= min {
        return min;
    }

    let x: f64 = rng.gen();
    let y = 1.0 - (1.0 / (x + 1.0)).powf(weight);
    let range = (max - min) as f64;
    let index = ((y * range).floor().max(0.0) as usize).saturating_add(min);

    let index = index.clamp(min, max - 1);
    debug!("Pareto sample x={x:.4} y={y:.4} -> index {index} of {min}..{max}");
    index
}

/// Picks an index with probability proportional to its weight.
///
/// Accumulates weights in order until the running sum exceeds a threshold
/// drawn from `[0, total)`. Weights are summed in `f64`, so any mix of finite
/// `f32` weights has a finite total. Returns `None` when the slice is empty or
/// the total weight is not a positive finite number.
pub fn select_by_weight<T, R, F>(rng: &mut R, items: &[T], weight: F) -> Option<usize>
where
    R: Rng + ?Sized,
    F: Fn(&T) -> f32,
{
    let total: f64 = items.iter().map(|item| f64::from(weight(item))).sum();
    if items.is_empty() || !(total > 0.0 && total.is_finite()) {
        if !items.is_empty() {
            debug!("Weighted pick skipped: total weight {total} is unusable");
        }
        return None;
    }

    let threshold = rng.gen_range(0.0..total);
    let mut running = 0.0;
    for (index, item) in items.iter().enumerate() {
        running += f64::from(weight(item));
        if running > threshold {
            debug!("Weighted pick {index} (threshold {threshold:.3} of {total:.3})");
            return Some(index);
        }
    }

    // Float accumulation can fall short of the threshold by an ulp.
    Some(items.len() - 1)
}
