//! Account cash management.
//!
//! An account is a virtual cash balance plus the balance it started with
//! (kept for overall-return reporting). Holdings live in the trade engine's
//! per-account books, keyed by instrument; the balance here is the only cash
//! in the system.

use crate::types::{AccountId, Cash, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Cash,
    /// Opening balance, reporting only. Never mutated after creation.
    pub initial_balance: Cash,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: AccountId, opening_balance: Cash, timestamp: Timestamp) -> Self {
        debug_assert!(!opening_balance.is_negative());
        Self {
            id,
            balance: opening_balance,
            initial_balance: opening_balance,
            created_at: timestamp,
        }
    }

    pub fn credit(&mut self, amount: Cash) {
        self.balance = self.balance.add(amount);
    }

    pub fn debit(&mut self, amount: Cash) -> Result<(), AccountError> {
        if amount.value() > self.balance.value() {
            return Err(AccountError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.sub(amount);
        Ok(())
    }

    /// Cash gained or lost since opening. Ignores open holdings; the engine's
    /// account report adds their market value on top.
    pub fn cash_change(&self) -> Cash {
        self.balance.sub(self.initial_balance)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Cash, available: Cash },
}
