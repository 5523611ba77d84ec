// 11.4: connector health counters. plain atomics written from the connector
// task and read from anywhere; Relaxed is enough since nothing sequences on
// these, they exist for dashboards and the status endpoint.

use crate::feed::state::ConnState;
use crate::types::Timestamp;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

// 0 in the *_ms fields means "never happened"
#[derive(Debug, Default)]
pub struct FeedTelemetry {
    state: AtomicU8,
    reconnect_attempts: AtomicU32,
    subscribed_instruments: AtomicUsize,
    updates_total: AtomicU64,
    last_heartbeat_ms: AtomicI64,
    last_update_ms: AtomicI64,
    last_seen_ms: AtomicI64,
}

impl FeedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: ConnState) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }

    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn set_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::Relaxed);
    }

    pub fn set_subscribed(&self, count: usize) {
        self.subscribed_instruments.store(count, Ordering::Relaxed);
    }

    /// Any recognized inbound frame.
    pub fn mark_seen(&self, now: Timestamp) {
        self.last_seen_ms.store(now.as_millis(), Ordering::Relaxed);
    }

    pub fn mark_heartbeat(&self, now: Timestamp) {
        self.last_heartbeat_ms.store(now.as_millis(), Ordering::Relaxed);
    }

    /// An applied ticker. Bumps the running total as well.
    pub fn mark_update(&self, now: Timestamp) {
        self.last_update_ms.store(now.as_millis(), Ordering::Relaxed);
        self.updates_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn updates_total(&self) -> u64 {
        self.updates_total.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot for operators. Ages are computed against the
    /// caller's clock so a frozen snapshot keeps honest numbers.
    pub fn status(&self, now: Timestamp) -> FeedStatus {
        let state = self.state();
        FeedStatus {
            state,
            connected: state.is_live(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            subscribed_instruments: self.subscribed_instruments.load(Ordering::Relaxed),
            updates_total: self.updates_total.load(Ordering::Relaxed),
            ms_since_heartbeat: age_of(self.last_heartbeat_ms.load(Ordering::Relaxed), now),
            ms_since_update: age_of(self.last_update_ms.load(Ordering::Relaxed), now),
            ms_since_seen: age_of(self.last_seen_ms.load(Ordering::Relaxed), now),
        }
    }
}

fn age_of(mark_ms: i64, now: Timestamp) -> Option<i64> {
    if mark_ms == 0 {
        return None;
    }
    Some(Timestamp::from_millis(mark_ms).age_ms(now))
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    pub state: ConnState,
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub subscribed_instruments: usize,
    pub updates_total: u64,
    pub ms_since_heartbeat: Option<i64>,
    pub ms_since_update: Option<i64>,
    pub ms_since_seen: Option<i64>,
}
