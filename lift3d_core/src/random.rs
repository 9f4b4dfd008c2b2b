//! Per-step rendering randomness.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Two uniform `[0, 1)` scalars that fix the stochastic parts of a render.
///
/// One pair is drawn per outer training step and reused by every inner
/// render call of that step, so repeated gradient steps on the same batch see
/// the same sample jitter and background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandPair(pub f32, pub f32);

impl RandPair {
    /// Draw a fresh pair.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen::<f32>(), rng.gen::<f32>())
    }

    /// First value, used for sample placement.
    #[inline]
    pub fn jitter(&self) -> f32 {
        self.0
    }

    /// Second value, used for the background.
    #[inline]
    pub fn background(&self) -> f32 {
        self.1
    }
}
