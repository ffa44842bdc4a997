//! Injectable randomness for rolls and uniform scene picks.
//!
//! Rate computation is pure; only rolling and selection consume randomness,
//! and both go through [`RandomSource`] so tests can script exact draws.

use std::collections::VecDeque;

use rand::Rng;

/// Source of the two kinds of randomness the engine needs.
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`.
    fn roll(&mut self) -> f64;

    /// Uniform index in `0..len`. Callers guarantee `len > 0`.
    fn pick_index(&mut self, len: usize) -> usize;
}

/// Production source backed by the thread-local rand generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn roll(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }

    fn pick_index(&mut self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Scripted source for deterministic tests and replays. Draws are consumed
/// front-to-back; an exhausted script repeats its last value (or 0).
#[derive(Debug, Default, Clone)]
pub struct FixedRandom {
    draws: VecDeque<f64>,
    last: f64,
}

impl FixedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            last: 0.0,
        }
    }
}

impl RandomSource for FixedRandom {
    fn roll(&mut self) -> f64 {
        if let Some(draw) = self.draws.pop_front() {
            self.last = draw;
        }
        self.last
    }

    fn pick_index(&mut self, len: usize) -> usize {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = (self.roll() * len as f64) as usize;
        idx.min(len.saturating_sub(1))
    }
}
