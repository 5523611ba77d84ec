//! Trade execution and preview.

use super::core::{AccountShard, TradeEngine};
use super::results::{TradeError, TradeReceipt};
use crate::account::AccountError;
use crate::fees::{self, TradePlan};
use crate::instrument::Instrument;
use crate::journal::Trade;
use crate::persist::TradeCommit;
use crate::types::{AccountId, Cash, Price, Qty, Side, Timestamp, TradeId};
use rust_decimal::Decimal;
use std::sync::atomic::Ordering;
use tracing::{debug, error, info};

/// How the caller sized a trade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// A cash figure: the exact spend for buys, the desired net for sells.
    Amount(Decimal),
    /// An asset quantity.
    Quantity(Decimal),
    /// The entire held position. Sells only, resolved under the account lock
    /// so a concurrent trade cannot change what "all" means mid-flight.
    All,
}

impl TradeEngine {
    /// Buy `symbol`, spending exactly `amount` of cash (fee comes out of it).
    pub fn buy_by_amount(
        &self,
        account_id: AccountId,
        symbol: &str,
        amount: Decimal,
    ) -> Result<TradeReceipt, TradeError> {
        self.execute(account_id, symbol, Side::Buy, Sizing::Amount(amount))
    }

    /// Buy an exact `quantity` of `symbol`; the fee goes on top of the subtotal.
    pub fn buy_by_quantity(
        &self,
        account_id: AccountId,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<TradeReceipt, TradeError> {
        self.execute(account_id, symbol, Side::Buy, Sizing::Quantity(quantity))
    }

    /// Sell enough of `symbol` to net at least `amount` of cash after the fee.
    pub fn sell_by_amount(
        &self,
        account_id: AccountId,
        symbol: &str,
        amount: Decimal,
    ) -> Result<TradeReceipt, TradeError> {
        self.execute(account_id, symbol, Side::Sell, Sizing::Amount(amount))
    }

    /// Sell an exact `quantity` of `symbol`.
    pub fn sell_by_quantity(
        &self,
        account_id: AccountId,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<TradeReceipt, TradeError> {
        self.execute(account_id, symbol, Side::Sell, Sizing::Quantity(quantity))
    }

    /// Close the whole position in `symbol`. Exempt from the per-trade cash
    /// bounds, so a dust position is always closable.
    pub fn sell_all(&self, account_id: AccountId, symbol: &str) -> Result<TradeReceipt, TradeError> {
        self.execute(account_id, symbol, Side::Sell, Sizing::All)
    }

    /// Price a request without committing it. Runs the full validation
    /// pipeline, so a plan returned here is exactly the trade `execute`
    /// would commit at the same price, and a request that would be rejected
    /// fails with the same error.
    pub fn preview(
        &self,
        account_id: AccountId,
        symbol: &str,
        side: Side,
        sizing: Sizing,
    ) -> Result<TradePlan, TradeError> {
        let sizing = vet_sizing(sizing)?;
        let instrument = self.resolve(symbol)?;
        let price = self.quoted_price(instrument)?;
        let shard = self.shard(account_id)?;
        let shard = shard.lock();
        self.plan(&shard, instrument, price, side, sizing)
    }

    // 12.3: one path for every request shape. validate, plan, persist, then
    // apply in memory; nothing in the shard moves until the sink has taken
    // the commit, so a failure at any step leaves the account byte-identical.
    fn execute(
        &self,
        account_id: AccountId,
        symbol: &str,
        side: Side,
        sizing: Sizing,
    ) -> Result<TradeReceipt, TradeError> {
        let outcome = (|| {
            let sizing = vet_sizing(sizing)?;
            let instrument = self.resolve(symbol)?;
            let price = self.quoted_price(instrument)?;
            let shard = self.shard(account_id)?;
            let mut shard = shard.lock();
            self.execute_locked(&mut shard, instrument, price, side, sizing)
        })();

        match &outcome {
            Ok(receipt) => info!(
                account = account_id.0,
                trade = receipt.trade.id.0,
                summary = %receipt.summary,
                "trade committed"
            ),
            Err(err) if err.is_rejection() => {
                debug!(account = account_id.0, symbol, %err, "trade rejected");
            }
            Err(err) => {
                error!(account = account_id.0, symbol, %err, "trade commit failed");
            }
        }
        outcome
    }

    fn resolve(&self, symbol: &str) -> Result<&Instrument, TradeError> {
        self.catalog
            .get(symbol)
            .ok_or_else(|| TradeError::InvalidRequest {
                reason: format!("unknown symbol {symbol}"),
            })
    }

    /// An instrument is tradable only while listed active and carrying a live
    /// quote; both gaps surface as the same error because both mean "the
    /// engine has no price it will honor".
    fn quoted_price(&self, instrument: &Instrument) -> Result<Price, TradeError> {
        if !instrument.active {
            return Err(TradeError::PriceUnavailable {
                symbol: instrument.symbol.clone(),
            });
        }
        self.prices
            .last_price(instrument.symbol.as_str())
            .ok_or_else(|| TradeError::PriceUnavailable {
                symbol: instrument.symbol.clone(),
            })
    }

    // 12.4: reduce a request to a TradePlan against the locked shard. pure
    // with respect to the shard; preview calls this and returns the plan,
    // execute calls this and then commits it.
    fn plan(
        &self,
        shard: &AccountShard,
        instrument: &Instrument,
        price: Price,
        side: Side,
        sizing: Sizing,
    ) -> Result<TradePlan, TradeError> {
        let symbol = &instrument.symbol;
        let fee_pct = self.trading.fee_pct;

        let plan = match (side, sizing) {
            (Side::Buy, Sizing::Amount(amount)) => {
                let spend = Cash::new(amount);
                self.check_cash_bounds(spend)?;
                fees::plan_buy_by_amount(symbol, spend, price, fee_pct)
            }
            (Side::Buy, Sizing::Quantity(quantity)) => {
                let plan =
                    fees::plan_buy_by_quantity(symbol, Qty::new_unchecked(quantity), price, fee_pct);
                self.check_cash_bounds(plan.gross)?;
                plan
            }
            (Side::Buy, Sizing::All) => {
                return Err(TradeError::InvalidRequest {
                    reason: "buys must be sized by amount or quantity".to_string(),
                });
            }
            (Side::Sell, Sizing::Amount(amount)) => {
                let desired_net = Cash::new(amount);
                self.check_cash_bounds(desired_net)?;
                fees::plan_sell_by_amount(symbol, desired_net, price, fee_pct)
            }
            (Side::Sell, Sizing::Quantity(quantity)) => {
                let plan = fees::plan_sell_by_quantity(
                    symbol,
                    Qty::new_unchecked(quantity),
                    price,
                    fee_pct,
                );
                self.check_cash_bounds(plan.gross)?;
                plan
            }
            (Side::Sell, Sizing::All) => {
                let Some(position) = shard.positions.get(symbol.as_str()) else {
                    return Err(TradeError::InvalidRequest {
                        reason: format!("no {symbol} position to close"),
                    });
                };
                fees::plan_sell_by_quantity(symbol, position.quantity, price, fee_pct)
            }
        };

        // only buy-by-amount can floor to nothing; everything else carries a
        // positive quantity by construction
        if plan.quantity.is_zero() {
            return Err(TradeError::InvalidRequest {
                reason: format!("amount buys less than one step of {symbol} at the current price"),
            });
        }

        match plan.side {
            Side::Buy => {
                let available = shard.account.balance;
                if plan.total.value() > available.value() {
                    return Err(TradeError::InsufficientFunds {
                        required: plan.total,
                        available,
                        shortfall: plan.total.sub(available),
                    });
                }
            }
            Side::Sell => {
                let held = shard
                    .positions
                    .get(symbol.as_str())
                    .map_or_else(Qty::zero, |p| p.quantity);
                if plan.quantity > held {
                    return Err(TradeError::InsufficientHoldings {
                        symbol: symbol.clone(),
                        requested: plan.quantity,
                        held,
                        shortfall: plan.quantity.value() - held.value(),
                    });
                }
            }
        }

        Ok(plan)
    }

    fn execute_locked(
        &self,
        shard: &mut AccountShard,
        instrument: &Instrument,
        price: Price,
        side: Side,
        sizing: Sizing,
    ) -> Result<TradeReceipt, TradeError> {
        let plan = self.plan(shard, instrument, price, side, sizing)?;
        let now = Timestamp::now();

        // post-state, computed off clones before anything in the shard moves
        let mut account_after = shard.account.clone();
        let (position_after, realized_pnl) = match plan.side {
            Side::Buy => {
                account_after.debit(plan.total).map_err(|err| {
                    let AccountError::InsufficientBalance {
                        requested,
                        available,
                    } = err;
                    TradeError::InsufficientFunds {
                        required: requested,
                        available,
                        shortfall: requested.sub(available),
                    }
                })?;
                let position = crate::holdings::apply_purchase(
                    shard.positions.get(plan.symbol.as_str()),
                    &plan.symbol,
                    plan.quantity,
                    plan.total,
                    now,
                );
                (Some(position), None)
            }
            Side::Sell => {
                let Some(position) = shard.positions.get(plan.symbol.as_str()) else {
                    // plan() guarantees the position exists; keep the types honest
                    return Err(TradeError::InvalidRequest {
                        reason: format!("no {} position to close", plan.symbol),
                    });
                };
                let outcome = crate::holdings::apply_sale(position, plan.quantity, now);
                account_after.credit(plan.total);
                let realized = plan.total.sub(outcome.cost_basis);
                (outcome.new_position, Some(realized))
            }
        };

        let trade = Trade {
            id: TradeId(self.next_trade_id.fetch_add(1, Ordering::Relaxed)),
            account_id: shard.account.id,
            symbol: plan.symbol.clone(),
            side: plan.side,
            quantity: plan.quantity,
            price: plan.price,
            fee: plan.fee,
            total: plan.total,
            realized_pnl,
            balance_before: shard.account.balance,
            balance_after: account_after.balance,
            executed_at: now,
        };

        // durable first; memory only moves once the sink has taken the commit
        self.sink.commit_trade(&TradeCommit {
            account: &account_after,
            position: position_after.as_ref(),
            trade: &trade,
        })?;

        let summary = summarize(&trade);
        shard.account = account_after;
        match position_after {
            Some(position) => {
                shard.positions.insert(plan.symbol.clone(), position);
            }
            None => {
                shard.positions.remove(plan.symbol.as_str());
            }
        }
        shard.journal.append(trade.clone());

        Ok(TradeReceipt { trade, summary })
    }

    fn check_cash_bounds(&self, amount: Cash) -> Result<(), TradeError> {
        let min = self.trading.min_trade_amount;
        let max = self.trading.max_trade_amount;
        if amount.value() < min || amount.value() > max {
            return Err(TradeError::InvalidRequest {
                reason: format!("trade value {amount} outside the allowed range {min} to {max}"),
            });
        }
        Ok(())
    }
}

/// Shape checks that need no market data: positive figures, cash rounded to
/// cents, quantities on the canonical step.
fn vet_sizing(sizing: Sizing) -> Result<Sizing, TradeError> {
    match sizing {
        Sizing::Amount(raw) => {
            if raw <= Decimal::ZERO {
                return Err(TradeError::InvalidRequest {
                    reason: "amount must be positive".to_string(),
                });
            }
            Ok(Sizing::Amount(Cash::rounded(raw).value()))
        }
        Sizing::Quantity(raw) => {
            if raw <= Decimal::ZERO {
                return Err(TradeError::InvalidRequest {
                    reason: "quantity must be positive".to_string(),
                });
            }
            if Qty::floor_raw(raw).value() != raw {
                return Err(TradeError::InvalidRequest {
                    reason: "quantity is finer than the 8-decimal asset step".to_string(),
                });
            }
            Ok(sizing)
        }
        Sizing::All => Ok(sizing),
    }
}

fn summarize(trade: &Trade) -> String {
    match trade.side {
        Side::Buy => format!(
            "BUY {} {} @ {}: spent {} (fee {})",
            trade.quantity, trade.symbol, trade.price, trade.total, trade.fee
        ),
        Side::Sell => {
            let realized = trade.realized_pnl.unwrap_or_else(Cash::zero);
            format!(
                "SELL {} {} @ {}: received {} (fee {}, realized {})",
                trade.quantity, trade.symbol, trade.price, trade.total, trade.fee, realized
            )
        }
    }
}
