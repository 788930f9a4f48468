//! Reconnect policy and backoff calculation.
//!
//! Sync-only building blocks; the async retry loop lives in the client crate.
//! The default policy performs no automatic retries: a dropped transport stays
//! dropped until the user (or the host) asks for a reconnect.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of automatic reconnect attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 0;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Bounded exponential backoff with jitter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Attempts after the first failure (default: 0, i.e. disabled).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in ms (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on any single delay in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.2).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether any automatic retry will happen.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Delay before retry `attempt` (zero-based), given `random` in `[0.0, 1.0)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, random: f64) -> Duration {
        Duration::from_millis(calculate_backoff_delay_with_random(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
            random,
        ))
    }
}

/// Calculate backoff delay with explicit randomness.
///
/// Formula: `min(max_delay, base_delay * 2^attempt) * (1 + (random * 2 - 1) * jitter)`.
/// `random` should be a value in `[0.0, 1.0)` from a PRNG; the jitter is
/// symmetric, so a factor of 0.2 varies the delay by ±20%.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay_with_random(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_delay_ms);

    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor.clamp(0.0, 1.0);
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_disabled() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_retries, 0);
        assert!(!policy.is_enabled());
        assert_eq!(policy, ReconnectPolicy::disabled());
    }

    #[test]
    fn midpoint_random_has_no_jitter() {
        assert_eq!(calculate_backoff_delay_with_random(0, 500, 30_000, 0.2, 0.5), 500);
        assert_eq!(calculate_backoff_delay_with_random(1, 500, 30_000, 0.2, 0.5), 1000);
        assert_eq!(calculate_backoff_delay_with_random(3, 500, 30_000, 0.2, 0.5), 4000);
    }

    #[test]
    fn delay_is_capped() {
        assert_eq!(calculate_backoff_delay_with_random(20, 500, 30_000, 0.0, 0.9), 30_000);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        assert_eq!(calculate_backoff_delay_with_random(u32::MAX, u64::MAX, 1000, 0.0, 0.0), 1000);
    }

    #[test]
    fn jitter_bounds() {
        let low = calculate_backoff_delay_with_random(0, 1000, 30_000, 0.2, 0.0);
        let high = calculate_backoff_delay_with_random(0, 1000, 30_000, 0.2, 0.999_999);
        assert_eq!(low, 800);
        assert_eq!(high, 1200);
    }

    #[test]
    fn policy_delay_for() {
        let policy = ReconnectPolicy {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.0,
        };
        assert!(policy.is_enabled());
        assert_eq!(policy.delay_for(2, 0.3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10, 0.3), Duration::from_millis(1000));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str(r#"{"maxRetries": 4}"#).unwrap();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
        assert!((policy.jitter_factor - DEFAULT_JITTER_FACTOR).abs() < f64::EPSILON);
    }
}
