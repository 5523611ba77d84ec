//! Persistence seam.
//!
//! Durable storage is an external collaborator. The engine hands it the
//! complete post-trade picture in one call and applies nothing in memory
//! until that call returns Ok, so a storage failure surfaces as a failed
//! trade with zero partial effect. The sink must treat the three writes as
//! all-or-nothing on its side too.

use crate::account::Account;
use crate::holdings::Position;
use crate::journal::Trade;
use crate::types::{AccountId, Cash, Symbol};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Everything a committed trade changes, post-state.
#[derive(Debug)]
pub struct TradeCommit<'a> {
    pub account: &'a Account,
    /// Post-trade position for the traded symbol; None when the trade closed
    /// it (a zero-quantity row is never persisted).
    pub position: Option<&'a Position>,
    pub trade: &'a Trade,
}

pub trait PersistenceSink: Send + Sync {
    fn commit_trade(&self, commit: &TradeCommit<'_>) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// In-memory tables. The default sink for the sim binary and tests; also the
/// reference for what a relational sink would write.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<MemoryTables>,
}

#[derive(Debug, Default)]
struct MemoryTables {
    balances: HashMap<AccountId, Cash>,
    positions: HashMap<(AccountId, Symbol), Position>,
    trades: Vec<Trade>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trade_count(&self) -> usize {
        self.tables.lock().trades.len()
    }

    pub fn balance_of(&self, account_id: AccountId) -> Option<Cash> {
        self.tables.lock().balances.get(&account_id).copied()
    }

    pub fn position_of(&self, account_id: AccountId, symbol: &Symbol) -> Option<Position> {
        self.tables
            .lock()
            .positions
            .get(&(account_id, symbol.clone()))
            .cloned()
    }

    pub fn trades_for(&self, account_id: AccountId) -> Vec<Trade> {
        self.tables
            .lock()
            .trades
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect()
    }
}

impl PersistenceSink for MemorySink {
    fn commit_trade(&self, commit: &TradeCommit<'_>) -> Result<(), PersistenceError> {
        // one lock, three writes: all-or-nothing by construction
        let mut tables = self.tables.lock();
        tables
            .balances
            .insert(commit.account.id, commit.account.balance);
        let key = (commit.account.id, commit.trade.symbol.clone());
        match commit.position {
            Some(position) => {
                tables.positions.insert(key, position.clone());
            }
            None => {
                tables.positions.remove(&key);
            }
        }
        tables.trades.push(commit.trade.clone());
        Ok(())
    }
}
