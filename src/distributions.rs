//! Small sampling helpers shared by the engines, bridging `rand`/`rand_distr`'s `f32`/`f64`
//! distributions to the generic [`Real`](crate::numeric_types::Real) scalar type.

use crate::numeric_types::Real;
use num::ToPrimitive;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draws a single standard-normal sample as `R`.
pub fn standard_normal<R: Real>(rng: &mut impl Rng) -> R {
    let x: f64 = rng.sample(StandardNormal);
    R::from_f64(x).unwrap()
}

/// Draws `N(mean, std)`.
pub fn normal<R: Real>(rng: &mut impl Rng, mean: R, std: R) -> R {
    mean + std * standard_normal(rng)
}

/// Draws a category index (0-based) from a discrete distribution over `probs`, which is
/// assumed to (approximately) sum to 1; falls back to the last category on rounding error.
pub fn categorical<R: Real>(rng: &mut impl Rng, probs: &[R]) -> usize {
    let u: f64 = rng.gen();
    let mut acc = 0.0f64;
    for (i, p) in probs.iter().enumerate() {
        acc += p.to_f64().unwrap();
        if u <= acc {
            return i;
        }
    }
    probs.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn normal_shifts_and_scales_the_standard_draw() {
        let mut a = ChaCha8Rng::seed_from_u64(4);
        let mut b = ChaCha8Rng::seed_from_u64(4);
        let z: f64 = standard_normal(&mut a);
        let shifted: f64 = normal(&mut b, 10.0, 2.0);
        assert!((shifted - (10.0 + 2.0 * z)).abs() < 1e-12);
    }

    #[test]
    fn categorical_always_returns_an_in_range_index() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let probs = vec![0.1, 0.2, 0.7];
        for _ in 0..50 {
            let cat = categorical(&mut rng, &probs);
            assert!(cat < probs.len());
        }
    }
}
