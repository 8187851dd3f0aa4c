//! Throttling between upstream fetches
//!
//! "Slow" passes suspend for a randomized interval after every item that
//! produced data, to stay under the upstream rate limit. The suspension is an
//! injected [`Pause`] so tests can swap real sleeping for a recorder.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;

/// Randomized delay: `base` plus a uniformly random share of `jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            jitter: Duration::from_secs(10),
        }
    }
}

impl ThrottlePolicy {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        self.base + self.jitter.mul_f64(rng.gen::<f64>())
    }
}

/// Cooperative suspension between items.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately, remembering every requested pause.
#[derive(Debug, Default)]
pub struct NoPause {
    requested: Mutex<Vec<Duration>>,
}

impl NoPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl Pause for NoPause {
    async fn pause(&self, duration: Duration) {
        self.requested.lock().push(duration);
    }
}
