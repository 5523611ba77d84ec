// 12.0: the trade engine. account books behind per-account locks, one
// execution path for every request shape, persistence-first commits.
// core holds state and reads, trades holds the execution pipeline.

mod core;
mod results;
mod trades;

pub use self::core::TradeEngine;
pub use self::results::{AccountReport, PositionReport, TradeError, TradeReceipt};
pub use self::trades::Sizing;
