// 6.0: the transaction journal. append-only, one per account. every committed
// trade lands here with the balance on both sides of it, which makes the
// journal the audit trail: replaying signed totals from the opening balance
// must land exactly on the current balance.
// aggregates are folds over the entries, computed on demand, never cached.

use crate::types::{AccountId, Cash, Price, Qty, Side, Symbol, Timestamp, TradeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Qty,
    /// Feed price per unit at execution.
    pub price: Price,
    pub fee: Cash,
    /// Absolute cash moved on the account: the debit for a buy (fee
    /// included), the net credit for a sell (fee already off).
    pub total: Cash,
    /// Sells only; buys carry None.
    pub realized_pnl: Option<Cash>,
    pub balance_before: Cash,
    pub balance_after: Cash,
    pub executed_at: Timestamp,
}

impl Trade {
    /// Balance delta this trade caused: negative for buys, positive for sells.
    pub fn signed_total(&self) -> Cash {
        self.total.mul(self.side.cash_sign())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<Trade>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trade: Trade) {
        debug_assert!(
            self.entries.last().map_or(true, |last| trade.id > last.id),
            "journal ids must be strictly increasing"
        );
        self.entries.push(trade);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&Trade> {
        self.entries.last()
    }

    /// Most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[Trade] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    // 6.1: derived totals. always the fold, so they cannot drift from the rows.
    pub fn totals(&self) -> JournalTotals {
        let mut totals = JournalTotals::default();
        for trade in &self.entries {
            totals.trades += 1;
            match trade.side {
                Side::Buy => totals.bought = totals.bought.add(trade.total),
                Side::Sell => totals.sold = totals.sold.add(trade.total),
            }
            totals.fees = totals.fees.add(trade.fee);
            if let Some(pnl) = trade.realized_pnl {
                totals.realized_pnl = totals.realized_pnl.add(pnl);
            }
        }
        totals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTotals {
    pub trades: usize,
    /// Cash spent on buys, fees included.
    pub bought: Cash,
    /// Net cash received from sells, fees already off.
    pub sold: Cash,
    pub fees: Cash,
    pub realized_pnl: Cash,
}

impl Default for JournalTotals {
    fn default() -> Self {
        Self {
            trades: 0,
            bought: Cash::zero(),
            sold: Cash::zero(),
            fees: Cash::zero(),
            realized_pnl: Cash::zero(),
        }
    }
}

impl JournalTotals {
    /// Net balance change the journal accounts for.
    pub fn net_flow(&self) -> Cash {
        self.sold.sub(self.bought)
    }
}
