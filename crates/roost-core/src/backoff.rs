//! Reconnect backoff configuration and delay calculation.
//!
//! Portable, sync-only building blocks: the async sleep lives in the
//! gateway's connection loop, which also supplies the randomness. The delay
//! grows as `min(cap, base * 2^attempt)` and is then scaled by a
//! multiplicative jitter in `[0.5, 1.0]`, so simultaneous clients spread
//! their retries instead of stampeding the gateway together.

use serde::{Deserialize, Serialize};

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default delay cap in milliseconds.
pub const DEFAULT_CAP_DELAY_MS: u64 = 30_000;

/// Configuration for reconnect backoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffConfig {
    /// Base delay for exponential backoff in ms (default: 1000).
    pub base_delay_ms: u64,
    /// Maximum delay between attempts in ms (default: 30000).
    pub cap_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            cap_delay_ms: DEFAULT_CAP_DELAY_MS,
        }
    }
}

/// Mutable backoff progress for one reconnect sequence.
///
/// `attempt` increments on every failed attempt and resets to zero only on a
/// successful `connected` transition.
#[derive(Clone, Debug, Default)]
pub struct BackoffState {
    /// Zero-based count of consecutive failed attempts.
    pub attempt: u32,
}

impl BackoffState {
    /// Compute the delay for the current attempt and advance the counter.
    ///
    /// `random` must be in `[0.0, 1.0)`, typically from the caller's PRNG.
    #[must_use]
    pub fn next_delay_ms(&mut self, config: &BackoffConfig, random: f64) -> u64 {
        let delay = backoff_delay_with_random(
            self.attempt,
            config.base_delay_ms,
            config.cap_delay_ms,
            random,
        );
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Calculate an exponential backoff delay with explicit randomness.
///
/// Formula: `min(cap, base * 2^attempt) * (0.5 + random * 0.5)`
///
/// `random` in `[0.0, 1.0)` maps linearly onto a jitter factor in
/// `[0.5, 1.0]`, so the result never exceeds the capped exponential value
/// and never drops below half of it.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_with_random(
    attempt: u32,
    base_delay_ms: u64,
    cap_delay_ms: u64,
    random: f64,
) -> u64 {
    // Exponential backoff: base * 2^attempt, saturating on overflow
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(cap_delay_ms);

    // Multiplicative jitter in [0.5, 1.0]
    let jitter = 0.5 + random.clamp(0.0, 1.0) * 0.5;
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round() as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
