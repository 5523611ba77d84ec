// 11.2: reconnect scheduling. linear backoff, not exponential: the upstream
// is a shared public feed that recovers in seconds, so min(base * attempt,
// cap) reaches the cap quickly and sits there. a long cooldown kicks in only
// after a full cycle of failures.

use crate::config::FeedConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    rate_limit_pause: Duration,
    max_attempts: u32,
    exhausted_pause: Duration,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            base: config.backoff_base(),
            cap: config.backoff_cap(),
            rate_limit_pause: config.rate_limit_pause(),
            max_attempts: config.max_reconnect_attempts,
            exhausted_pause: config.exhausted_pause(),
            attempt: 0,
        }
    }

    /// Consecutive failures since the last healthy stretch.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed cycle and return how long to wait before the next
    /// dial. Once the count passes `max_attempts` the schedule restarts
    /// from zero after one long pause.
    pub fn on_failure(&mut self) -> Duration {
        self.attempt += 1;
        if self.attempt > self.max_attempts {
            self.attempt = 0;
            return self.exhausted_pause;
        }
        (self.base * self.attempt).min(self.cap)
    }

    /// Throttled by the provider. Fixed pause; deliberately does not touch
    /// the failure count, a throttle is not a dead upstream.
    pub fn on_rate_limit(&self) -> Duration {
        self.rate_limit_pause
    }

    /// Called when the stream turns healthy or an operator forces a restart.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
