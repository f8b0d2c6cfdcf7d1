//! Per-realization PRNG derivation.
//!
//! `ChaCha8Rng` is a counter-based stream cipher RNG: seeding it once from the parent seed
//! and then setting its stream index to the realization number gives every realization an
//! independent, reproducible substream regardless of which worker produces it, and without
//! any inter-worker coordination.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derives the deterministic child RNG for realization `index` of a call seeded by
/// `parent_seed`.
pub fn child_rng(parent_seed: u64, index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(parent_seed);
    rng.set_stream(index);
    rng.set_word_pos(0);
    rng
}
