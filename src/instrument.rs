//! Instrument catalog.
//!
//! The tradable universe is a fixed set of spot instruments, each tied to an
//! upstream feed code (the identifier the market data provider uses for its
//! ticker stream). Instruments are immutable after listing apart from the
//! active flag.

use crate::types::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    /// Human-readable name (e.g., "Bitcoin")
    pub name: String,
    /// Identifier used on the upstream feed (e.g., "BTCUSDT")
    pub feed_code: String,
    /// Inactive instruments stay listed but reject trades and subscriptions
    pub active: bool,
}

impl Instrument {
    pub fn new(symbol: impl Into<Symbol>, name: &str, feed_code: &str) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.to_string(),
            feed_code: feed_code.to_string(),
            active: true,
        }
    }
}

/// Lookup by symbol and by feed code. The feed-code index exists because
/// inbound tickers name instruments in the provider's vocabulary, not ours.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    instruments: HashMap<Symbol, Instrument>,
    by_feed_code: HashMap<String, Symbol>,
}

impl InstrumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard twenty-instrument listing.
    pub fn default_universe() -> Self {
        let mut catalog = Self::new();
        for (symbol, name, feed_code) in [
            ("BTC", "Bitcoin", "BTCUSDT"),
            ("ETH", "Ethereum", "ETHUSDT"),
            ("BNB", "BNB", "BNBUSDT"),
            ("SOL", "Solana", "SOLUSDT"),
            ("XRP", "XRP", "XRPUSDT"),
            ("ADA", "Cardano", "ADAUSDT"),
            ("DOGE", "Dogecoin", "DOGEUSDT"),
            ("AVAX", "Avalanche", "AVAXUSDT"),
            ("DOT", "Polkadot", "DOTUSDT"),
            ("LINK", "Chainlink", "LINKUSDT"),
            ("MATIC", "Polygon", "MATICUSDT"),
            ("LTC", "Litecoin", "LTCUSDT"),
            ("UNI", "Uniswap", "UNIUSDT"),
            ("ATOM", "Cosmos", "ATOMUSDT"),
            ("XLM", "Stellar", "XLMUSDT"),
            ("NEAR", "NEAR Protocol", "NEARUSDT"),
            ("APT", "Aptos", "APTUSDT"),
            ("FIL", "Filecoin", "FILUSDT"),
            ("ARB", "Arbitrum", "ARBUSDT"),
            ("OP", "Optimism", "OPUSDT"),
        ] {
            catalog.list(Instrument::new(symbol, name, feed_code));
        }
        catalog
    }

    pub fn list(&mut self, instrument: Instrument) {
        self.by_feed_code
            .insert(instrument.feed_code.clone(), instrument.symbol.clone());
        self.instruments.insert(instrument.symbol.clone(), instrument);
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn resolve_feed_code(&self, feed_code: &str) -> Option<&Instrument> {
        let symbol = self.by_feed_code.get(feed_code)?;
        self.instruments.get(symbol)
    }

    pub fn set_active(&mut self, symbol: &str, active: bool) -> bool {
        match self.instruments.get_mut(symbol) {
            Some(instrument) => {
                instrument.active = active;
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values().filter(|i| i.active)
    }

    /// Feed codes for the batch subscribe request, sorted for a stable wire
    /// payload.
    pub fn active_feed_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.active().map(|i| i.feed_code.clone()).collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
