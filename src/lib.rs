// papertrade-core: crypto paper trading engine fed by a live ticker stream.
// persistence-first architecture: a trade moves the in-memory books only
// after the storage sink has accepted the full commit, so books and store
// never diverge.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Symbol, Side, Price, Cash, Qty, ids
//   2.x  instrument.rs: tradable universe, feed-code mapping
//   3.x  account.rs: virtual cash balance, credit/debit
//   4.x  holdings.rs: positions, average cost method
//   5.x  quote.rs: last-quote cache, one writer, many readers
//   6.x  journal.rs: append-only trade journal, audit totals
//   7.x  fees.rs: trade sizing arithmetic, fee schedule, TradePlan
//   8.x  persist.rs: persistence seam, in-memory reference sink
//   9.x  events.rs: broadcast price events for downstream consumers
//   10.x config.rs: feed timings, backoff schedule, trading limits
//   11.x feed/: websocket connector, reconnect, liveness, telemetry
//   12.x engine/: account books, execution pipeline, reporting

// trading modules
pub mod account;
pub mod engine;
pub mod fees;
pub mod holdings;
pub mod journal;
pub mod persist;
pub mod types;

// market data modules
pub mod events;
pub mod feed;
pub mod instrument;
pub mod quote;

// integration modules
pub mod config;

// re exports for convenience
pub use account::*;
pub use engine::*;
pub use events::*;
pub use fees::*;
pub use holdings::*;
pub use instrument::*;
pub use journal::*;
pub use persist::*;
pub use quote::*;
pub use types::*;
pub use config::{AppConfig, ConfigError, FeedConfig, TradingConfig};
pub use feed::{ConnState, FeedConnector, FeedError, FeedHandle, FeedStatus};
