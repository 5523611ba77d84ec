// 10.0 config.rs: all settings in one place. feed timings, backoff schedule,
// trading limits. durations are millisecond fields with Duration accessors so
// the structs stay serde-plain.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Streaming connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    // Upstream websocket endpoint
    pub url: String,
    // Channel named in the batch subscribe request
    pub channel: String,
    // Expected heartbeat cadence from the provider
    pub heartbeat_interval_ms: u64,
    // How often the staleness watchdog looks at the clock
    pub watchdog_period_ms: u64,
    // Stale once nothing arrived for factor × heartbeat interval
    pub stale_after_factor: u32,
    // Floor between consecutive dial attempts
    pub min_connect_interval_ms: u64,
    // Give up on a dial that hangs this long
    pub connect_timeout_ms: u64,
    // Linear backoff: min(base × attempt, cap)
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    // Fixed pause after a provider throttle signal
    pub rate_limit_pause_ms: u64,
    // After this many consecutive failures, take the long pause and restart
    // the schedule
    pub max_reconnect_attempts: u32,
    pub exhausted_pause_ms: u64,
    // Broadcast channel capacity for price events
    pub event_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://feed.example.com/stream".to_string(),
            channel: "ticker".to_string(),
            heartbeat_interval_ms: 5_000,
            watchdog_period_ms: 3_000,
            stale_after_factor: 3,
            min_connect_interval_ms: 1_000,
            connect_timeout_ms: 10_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 3_000,
            rate_limit_pause_ms: 5_000,
            max_reconnect_attempts: 10,
            exhausted_pause_ms: 30_000,
            event_buffer: 256,
        }
    }
}

impl FeedConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms * self.stale_after_factor as u64)
    }

    pub fn min_connect_interval(&self) -> Duration {
        Duration::from_millis(self.min_connect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limit_pause_ms)
    }

    pub fn exhausted_pause(&self) -> Duration {
        Duration::from_millis(self.exhausted_pause_ms)
    }
}

// 10.1: trading limits and the fee schedule. fee_pct 0.10 means 0.10%.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub fee_pct: Decimal,
    // Cash bounds on a single trade (the spend, desired net, or subtotal
    // depending on request shape)
    pub min_trade_amount: Decimal,
    pub max_trade_amount: Decimal,
    // Balance a freshly created account starts with
    pub default_opening_balance: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            fee_pct: dec!(0.10),
            min_trade_amount: dec!(1.00),
            max_trade_amount: dec!(1000000.00),
            default_opening_balance: dec!(10000.00),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub trading: TradingConfig,
}

impl AppConfig {
    // Preset for fee-free venues and accounting demos
    pub fn zero_fee() -> Self {
        let mut config = Self::default();
        config.trading.fee_pct = Decimal::ZERO;
        config
    }

    // Preset for flaky links: tighter watchdog, quicker and more persistent
    // reconnects
    pub fn fast_recovery() -> Self {
        let mut config = Self::default();
        config.feed.heartbeat_interval_ms = 2_000;
        config.feed.watchdog_period_ms = 1_000;
        config.feed.backoff_base_ms = 250;
        config.feed.backoff_cap_ms = 1_000;
        config.feed.max_reconnect_attempts = 30;
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.feed.url.starts_with("ws://") && !self.feed.url.starts_with("wss://") {
            return Err(ConfigError::InvalidFeed {
                reason: "URL must be a ws:// or wss:// endpoint".to_string(),
            });
        }
        if self.feed.channel.is_empty() {
            return Err(ConfigError::InvalidFeed {
                reason: "Channel name must not be empty".to_string(),
            });
        }
        if self.feed.heartbeat_interval_ms == 0
            || self.feed.watchdog_period_ms == 0
            || self.feed.stale_after_factor == 0
        {
            return Err(ConfigError::InvalidFeed {
                reason: "Heartbeat, watchdog and staleness factor must be positive".to_string(),
            });
        }
        if self.feed.backoff_base_ms == 0 || self.feed.backoff_cap_ms < self.feed.backoff_base_ms {
            return Err(ConfigError::InvalidFeed {
                reason: "Backoff cap must be at least the base delay".to_string(),
            });
        }
        if self.feed.max_reconnect_attempts == 0 {
            return Err(ConfigError::InvalidFeed {
                reason: "Need at least 1 reconnect attempt per cycle".to_string(),
            });
        }
        if self.feed.event_buffer == 0 {
            return Err(ConfigError::InvalidFeed {
                reason: "Event buffer must hold at least 1 event".to_string(),
            });
        }

        if self.trading.fee_pct < Decimal::ZERO || self.trading.fee_pct >= dec!(100) {
            return Err(ConfigError::InvalidTrading {
                reason: "Fee percentage must be in [0, 100)".to_string(),
            });
        }
        if self.trading.min_trade_amount <= Decimal::ZERO
            || self.trading.min_trade_amount >= self.trading.max_trade_amount
        {
            return Err(ConfigError::InvalidTrading {
                reason: "Min trade must be positive and below max".to_string(),
            });
        }
        if self.trading.default_opening_balance < Decimal::ZERO {
            return Err(ConfigError::InvalidTrading {
                reason: "Opening balance cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidFeed { reason: String },
    InvalidTrading { reason: String },
}
