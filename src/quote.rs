// Price cache.
//
// One writer (the feed connector task), many concurrent readers (the trade
// engine and telemetry consumers). A Quote is a small Copy record replaced
// wholesale on every applied update, so a reader either sees the previous
// quote or the new one, never a half-written mix. The write lock is held only
// for a map insert.

use crate::types::{Price, Symbol, Timestamp};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest state of one instrument on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub last: Price,
    /// 24h absolute change in cash terms (may be negative)
    pub change_24h: Decimal,
    /// 24h change in percent
    pub change_pct_24h: Decimal,
    /// When this quote was applied locally
    pub at: Timestamp,
}

impl Quote {
    pub fn new(last: Price, change_24h: Decimal, change_pct_24h: Decimal, at: Timestamp) -> Self {
        Self {
            last,
            change_24h,
            change_pct_24h,
            at,
        }
    }
}

#[derive(Debug, Default)]
pub struct PriceCache {
    quotes: RwLock<HashMap<Symbol, Quote>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the quote for `symbol`. Connector-only in practice; nothing
    /// enforces that here beyond the ownership of the cache handle.
    pub fn apply(&self, symbol: Symbol, quote: Quote) {
        self.quotes.write().insert(symbol, quote);
    }

    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().get(symbol).copied()
    }

    pub fn last_price(&self, symbol: &str) -> Option<Price> {
        self.get(symbol).map(|q| q.last)
    }

    /// Age of the cached quote as of `now`, None if never quoted.
    pub fn age_ms(&self, symbol: &str, now: Timestamp) -> Option<i64> {
        self.get(symbol).map(|q| q.at.age_ms(now))
    }

    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }

    /// Copy of the whole cache, sorted by symbol for stable display.
    pub fn snapshot(&self) -> Vec<(Symbol, Quote)> {
        let mut entries: Vec<(Symbol, Quote)> = self
            .quotes
            .read()
            .iter()
            .map(|(s, q)| (s.clone(), *q))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }
}
