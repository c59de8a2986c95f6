//! Simulated packet loss.
//!
//! Reliability mechanisms are only observable when packets actually go
//! missing, so each endpoint direction is guarded by a [`LossGate`]: an
//! independent Bernoulli trial per segment (not per byte).  A gated-out
//! segment is logged as a drop event and never reaches the socket; the
//! sending side otherwise behaves exactly as if it had been transmitted.
//!
//! The randomness source is injectable so tests can pin outcomes: a seeded
//! RNG reproduces a whole loss pattern, and a scripted gate forces an exact
//! drop/keep sequence.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-direction drop decision source.
#[derive(Debug)]
pub struct LossGate {
    prob: f64,
    source: Source,
}

#[derive(Debug)]
enum Source {
    Rng(StdRng),
    Script(VecDeque<bool>),
}

impl LossGate {
    /// A gate dropping each segment independently with probability `prob`,
    /// seeded from OS entropy.
    pub fn bernoulli(prob: f64) -> Self {
        Self {
            prob,
            source: Source::Rng(StdRng::from_os_rng()),
        }
    }

    /// Like [`LossGate::bernoulli`] but with a fixed seed, so a whole run's
    /// loss pattern is reproducible.
    pub fn seeded(prob: f64, seed: u64) -> Self {
        Self {
            prob,
            source: Source::Rng(StdRng::seed_from_u64(seed)),
        }
    }

    /// A gate that replays an exact drop/keep script, then keeps everything
    /// once the script is exhausted.
    pub fn scripted<I: IntoIterator<Item = bool>>(drops: I) -> Self {
        Self {
            prob: 0.0,
            source: Source::Script(drops.into_iter().collect()),
        }
    }

    /// One independent drop decision.
    pub fn should_drop(&mut self) -> bool {
        match &mut self.source {
            Source::Rng(rng) => self.prob > 0.0 && rng.random::<f64>() < self.prob,
            Source::Script(script) => script.pop_front().unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
