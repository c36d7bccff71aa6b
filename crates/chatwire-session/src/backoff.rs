//! Reconnect backoff policy.
//!
//! Delays grow exponentially across consecutive failures up to a cap, with
//! additive positive jitter so the pre-jitter delay is still non-decreasing.
//! The attempt counter resets only after a connection stayed open for a
//! sustained period; a brief flap keeps the pressure off the remote end.
//! Conflict-type closes (stream replaced by another client) get a longer
//! cooldown floor regardless of attempt count.

use std::time::Duration;

use rand::Rng;

use chatwire_core::CloseReason;

/// Tunable parameters for the reconnect backoff.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first reconnect attempt
    pub initial: Duration,
    /// Upper bound for the pre-jitter delay
    pub max: Duration,
    /// Growth factor applied per consecutive failure
    pub multiplier: f64,
    /// Jitter fraction in `[0, 1]`; up to `jitter * delay` is added
    pub jitter: f64,
    /// Minimum open duration after which the attempt counter resets
    pub reset_after_open: Duration,
    /// Cooldown floor for stream-conflict closes
    pub conflict_cooldown: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
            reset_after_open: Duration::from_secs(60),
            conflict_cooldown: Duration::from_secs(300),
        }
    }
}

/// Backoff state for one session's reconnect loop.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl Backoff {
    /// Create backoff state with no recorded failures.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Number of consecutive failures recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pre-jitter delay for the next attempt. Non-decreasing in the attempt
    /// count, capped at the policy maximum.
    fn base_delay(&self) -> Duration {
        let secs = self.policy.initial.as_secs_f64() * self.policy.multiplier.powi(self.attempts as i32);
        Duration::from_secs_f64(secs.min(self.policy.max.as_secs_f64()))
    }

    /// Delay to wait before the next reconnect attempt, recording one more
    /// consecutive failure.
    pub fn next_delay(&mut self, reason: &CloseReason) -> Duration {
        let mut delay = self.base_delay();
        self.attempts = self.attempts.saturating_add(1);

        if reason.is_conflict() && delay < self.policy.conflict_cooldown {
            delay = self.policy.conflict_cooldown;
        }

        if self.policy.jitter > 0.0 {
            let extra = rand::thread_rng().gen::<f64>() * self.policy.jitter * delay.as_secs_f64();
            delay += Duration::from_secs_f64(extra);
        }
        delay
    }

    /// Record how long the connection stayed open before the latest close.
    /// A sustained open period resets the consecutive-failure count.
    pub fn note_open_duration(&mut self, open_for: Duration) {
        if open_for >= self.policy.reset_after_open {
            self.attempts = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter_policy() -> BackoffPolicy {
        BackoffPolicy {
            jitter: 0.0,
            ..BackoffPolicy::default()
        }
    }

    #[test]
    fn test_delays_non_decreasing_up_to_cap() {
        let policy = no_jitter_policy();
        let cap = policy.max;
        let mut backoff = Backoff::new(policy);

        let mut previous = Duration::ZERO;
        for _ in 0..12 {
            let delay = backoff.next_delay(&CloseReason::ConnectionLost);
            assert!(delay >= previous, "delay must not decrease");
            assert!(delay <= cap, "delay must not exceed the cap");
            previous = delay;
        }
        assert_eq!(previous, cap);
    }

    #[test]
    fn test_first_delay_is_initial() {
        let mut backoff = Backoff::new(no_jitter_policy());
        assert_eq!(
            backoff.next_delay(&CloseReason::ConnectionLost),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_jitter_only_adds() {
        let base = BackoffPolicy::default().initial;
        for _ in 0..20 {
            let mut backoff = Backoff::new(BackoffPolicy {
                jitter: 0.5,
                ..BackoffPolicy::default()
            });
            let delay = backoff.next_delay(&CloseReason::ConnectionLost);
            assert!(delay >= base);
            assert!(delay <= base + base);
        }
    }

    #[test]
    fn test_sustained_open_resets_attempts() {
        let mut backoff = Backoff::new(no_jitter_policy());
        for _ in 0..5 {
            let _ = backoff.next_delay(&CloseReason::ConnectionLost);
        }
        assert_eq!(backoff.attempts(), 5);

        // A short flap does not reset.
        backoff.note_open_duration(Duration::from_secs(1));
        assert_eq!(backoff.attempts(), 5);

        // A sustained open period does.
        backoff.note_open_duration(Duration::from_secs(120));
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(
            backoff.next_delay(&CloseReason::ConnectionLost),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_conflict_gets_cooldown_floor() {
        let mut backoff = Backoff::new(no_jitter_policy());
        let delay = backoff.next_delay(&CloseReason::StreamConflict);
        assert_eq!(delay, Duration::from_secs(300));

        // Ordinary closes are unaffected by the conflict floor.
        let mut ordinary = Backoff::new(no_jitter_policy());
        assert!(ordinary.next_delay(&CloseReason::ConnectionLost) < Duration::from_secs(300));
    }
}
