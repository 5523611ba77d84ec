// 12.2: result types and errors for trade operations.

use crate::journal::{JournalTotals, Trade};
use crate::persist::PersistenceError;
use crate::types::{AccountId, Cash, Price, Qty, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::Serialize;

/// Success result of an executed trade: the journal row plus a line the
/// request layer can show verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub trade: Trade,
    pub summary: String,
}

/// One position as reported to callers. Price-dependent fields are None for
/// instruments the feed has not quoted this session.
#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub symbol: Symbol,
    pub quantity: Qty,
    pub avg_cost: Decimal,
    pub invested: Cash,
    pub last_price: Option<Price>,
    pub market_value: Option<Cash>,
    pub unrealized_pnl: Option<Cash>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub account_id: AccountId,
    pub balance: Cash,
    /// Cash plus position values. Unquoted positions count at cost so the
    /// figure is always defined.
    pub equity: Cash,
    pub positions: Vec<PositionReport>,
    pub totals: JournalTotals,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TradeError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Account {0:?} not found")]
    UnknownAccount(AccountId),

    #[error("No price available for {symbol}")]
    PriceUnavailable { symbol: Symbol },

    #[error("Insufficient funds: need {required}, have {available} (short {shortfall})")]
    InsufficientFunds {
        required: Cash,
        available: Cash,
        shortfall: Cash,
    },

    #[error("Insufficient holdings of {symbol}: selling {requested}, holding {held} (short {shortfall})")]
    InsufficientHoldings {
        symbol: Symbol,
        requested: Qty,
        held: Qty,
        shortfall: Decimal,
    },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

impl TradeError {
    /// Business rejections come back with state untouched and a message the
    /// caller can render. A persistence failure is an infrastructure fault,
    /// not an answer.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, TradeError::Persistence(_))
    }
}
