//! Deterministic random number generation
//!
//! Every probabilistic decision in the engine (withdrawal draws, void
//! re-routing) goes through a [`RandomSource`] that the caller injects.
//! There is no ambient generator: a run is reproducible from its seed.

mod xorshift;

pub use xorshift::SeededRng;

/// Source of uniform draws used by the allocation engine.
///
/// Implemented by [`SeededRng`]; tests may supply scripted sources to force
/// specific withdrawal or re-routing outcomes.
pub trait RandomSource {
    /// Uniform draw in `[0.0, 1.0)`.
    fn next_f64(&mut self) -> f64;

    /// Bernoulli trial with the given success probability.
    ///
    /// Probabilities at or below 0.0 never succeed and never consume a draw;
    /// probabilities at or above 1.0 always succeed and never consume a draw.
    fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.next_f64() < probability
    }

    /// Uniform index in `[0, len)`. Returns `None` for an empty range.
    fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let idx = (self.next_f64() * len as f64) as usize;
        Some(idx.min(len - 1))
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}
