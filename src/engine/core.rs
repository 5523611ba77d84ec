// 12.0 engine/core.rs: the trade engine. holds every account's book behind a
// per-account lock; catalog and price cache come in shared and read-only.
// trades on different accounts run concurrently, trades on one account are
// serialized by its shard lock.

use super::results::{AccountReport, PositionReport, TradeError};
use crate::account::Account;
use crate::config::TradingConfig;
use crate::holdings::Position;
use crate::instrument::InstrumentCatalog;
use crate::journal::{Journal, Trade};
use crate::persist::PersistenceSink;
use crate::quote::PriceCache;
use crate::types::{AccountId, Cash, Symbol, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// 12.1: everything one account owns. one lock, one consistent book.
pub(super) struct AccountShard {
    pub(super) account: Account,
    pub(super) positions: HashMap<Symbol, Position>,
    pub(super) journal: Journal,
}

pub struct TradeEngine {
    pub(super) catalog: Arc<InstrumentCatalog>,
    pub(super) prices: Arc<PriceCache>,
    pub(super) sink: Arc<dyn PersistenceSink>,
    pub(super) trading: TradingConfig,
    pub(super) shards: RwLock<HashMap<AccountId, Arc<Mutex<AccountShard>>>>,
    next_account_id: AtomicU64,
    pub(super) next_trade_id: AtomicU64,
}

impl TradeEngine {
    pub fn new(
        catalog: Arc<InstrumentCatalog>,
        prices: Arc<PriceCache>,
        sink: Arc<dyn PersistenceSink>,
        trading: TradingConfig,
    ) -> Self {
        Self {
            catalog,
            prices,
            sink,
            trading,
            shards: RwLock::new(HashMap::new()),
            next_account_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
        }
    }

    pub fn create_account(&self) -> AccountId {
        self.create_account_with_balance(Cash::new(self.trading.default_opening_balance))
    }

    pub fn create_account_with_balance(&self, opening_balance: Cash) -> AccountId {
        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::Relaxed));
        let shard = AccountShard {
            account: Account::new(id, opening_balance, Timestamp::now()),
            positions: HashMap::new(),
            journal: Journal::new(),
        };
        self.shards.write().insert(id, Arc::new(Mutex::new(shard)));
        id
    }

    /// Clone out the shard handle so the registry lock is never held across
    /// a trade.
    pub(super) fn shard(&self, account_id: AccountId) -> Result<Arc<Mutex<AccountShard>>, TradeError> {
        self.shards
            .read()
            .get(&account_id)
            .cloned()
            .ok_or(TradeError::UnknownAccount(account_id))
    }

    pub fn balance(&self, account_id: AccountId) -> Result<Cash, TradeError> {
        Ok(self.shard(account_id)?.lock().account.balance)
    }

    /// None when the account is unknown or holds nothing in `symbol`.
    pub fn position(&self, account_id: AccountId, symbol: &str) -> Option<Position> {
        self.shard(account_id)
            .ok()?
            .lock()
            .positions
            .get(symbol)
            .cloned()
    }

    /// Most recent trades, newest last.
    pub fn trades(&self, account_id: AccountId, limit: usize) -> Result<Vec<Trade>, TradeError> {
        Ok(self.shard(account_id)?.lock().journal.recent(limit).to_vec())
    }

    // 12.1.1: the full account picture. valuation uses whatever the cache
    // holds right now; positions never quoted this session count at cost.
    pub fn account_report(&self, account_id: AccountId) -> Result<AccountReport, TradeError> {
        let shard = self.shard(account_id)?;
        let shard = shard.lock();

        let mut positions: Vec<PositionReport> = shard
            .positions
            .values()
            .map(|position| {
                let last_price = self.prices.last_price(position.symbol.as_str());
                PositionReport {
                    symbol: position.symbol.clone(),
                    quantity: position.quantity,
                    avg_cost: position.avg_cost,
                    invested: position.invested,
                    last_price,
                    market_value: last_price.map(|price| position.market_value(price)),
                    unrealized_pnl: last_price.map(|price| position.unrealized_pnl(price)),
                }
            })
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let equity = positions.iter().fold(shard.account.balance, |acc, report| {
            acc.add(report.market_value.unwrap_or(report.invested))
        });

        Ok(AccountReport {
            account_id,
            balance: shard.account.balance,
            equity,
            positions,
            totals: shard.journal.totals(),
            created_at: shard.account.created_at,
        })
    }
}
