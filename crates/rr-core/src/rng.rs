//! Deterministic simulation-level RNG.
//!
//! The engine itself is deterministic and never draws random numbers; the
//! RNG exists for pluggable collaborators (scenario generators, random
//! edge-failure drivers) so that the same seed always reproduces the same
//! dataset and event stream.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Seeded RNG for dataset generation and exogenous event drivers.
///
/// Used only in single-threaded contexts.  If parallel randomness is ever
/// needed, derive one child per worker with [`SimRng::child`].
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Choose an element of `items` with probability proportional to the
    /// matching entry of `weights`.
    ///
    /// Returns `None` if the slices are empty, differ in length, or the
    /// weights are all zero.
    pub fn choose_weighted<'a, T>(&mut self, items: &'a [T], weights: &[u32]) -> Option<&'a T> {
        if items.len() != weights.len() {
            return None;
        }
        let dist = WeightedIndex::new(weights).ok()?;
        items.get(dist.sample(&mut self.0))
    }
}
