// 4.0: spot holdings, average cost method. fees are folded into the amount
// invested, so realized pnl reflects true economic cost. invested is carried
// incrementally and never recomputed as quantity * average (that drifts).
// 4.1 has the purchase/sale transforms at the bottom.

use crate::types::{Cash, Price, Qty, Symbol, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// remainders below one canonical quantity step are dust and close the position.
pub const QTY_TOLERANCE: Decimal = dec!(0.00000001);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Qty,
    /// Cash per unit, fee-inclusive. Refreshed on purchase only; sales leave
    /// it untouched (selling a proportional slice does not change the cost of
    /// what remains).
    pub avg_cost: Decimal,
    /// Total cash sunk into the open quantity, fees included.
    pub invested: Cash,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    // 4.2: cost per unit recomputed from the carried totals. the stored
    // average is display state; this is what sale accounting uses.
    pub fn unit_cost(&self) -> Decimal {
        debug_assert!(!self.quantity.is_zero());
        self.invested.value() / self.quantity.value()
    }

    pub fn market_value(&self, price: Price) -> Cash {
        Cash::rounded(self.quantity.value() * price.value())
    }

    // 4.3: paper pnl. quantity * current price - invested.
    pub fn unrealized_pnl(&self, price: Price) -> Cash {
        self.market_value(price).sub(self.invested)
    }
}

#[derive(Debug, Clone)]
pub struct SaleOutcome {
    /// None when the sale closes the position.
    pub new_position: Option<Position>,
    /// Cost basis of the sold quantity, removed from `invested`.
    pub cost_basis: Cash,
}

// 4.4: first or subsequent purchase. the average is recomputed from the
// accumulated totals, never by blending the old and new averages.
pub fn apply_purchase(
    existing: Option<&Position>,
    symbol: &Symbol,
    quantity: Qty,
    total_paid: Cash,
    timestamp: Timestamp,
) -> Position {
    debug_assert!(quantity.value() > Decimal::ZERO, "purchase quantity must be positive");
    debug_assert!(total_paid.value() > Decimal::ZERO, "purchase total must be positive");

    match existing {
        None => {
            let avg_cost = total_paid.value() / quantity.value();
            Position {
                symbol: symbol.clone(),
                quantity,
                avg_cost,
                invested: total_paid,
                opened_at: timestamp,
                updated_at: timestamp,
            }
        }
        Some(position) => {
            debug_assert_eq!(&position.symbol, symbol);
            let new_quantity = position.quantity.add(quantity);
            let new_invested = position.invested.add(total_paid);
            Position {
                symbol: symbol.clone(),
                quantity: new_quantity,
                avg_cost: new_invested.value() / new_quantity.value(),
                invested: new_invested,
                opened_at: position.opened_at,
                updated_at: timestamp,
            }
        }
    }
}

// 4.5: sale of part or all of a holding. basis comes out of invested at the
// recomputed unit cost, rounded to cents; a full close takes the entire
// remaining invested exactly so deletion leaves no residue on the books.
// selling more than held is rejected upstream, before this runs.
pub fn apply_sale(position: &Position, quantity_sold: Qty, timestamp: Timestamp) -> SaleOutcome {
    debug_assert!(quantity_sold.value() > Decimal::ZERO, "sale quantity must be positive");
    debug_assert!(
        quantity_sold.value() <= position.quantity.value(),
        "oversell must be rejected before sale accounting"
    );

    let remaining = position
        .quantity
        .checked_sub(quantity_sold)
        .unwrap_or_else(Qty::zero);

    if remaining.value() < QTY_TOLERANCE {
        return SaleOutcome {
            new_position: None,
            cost_basis: position.invested,
        };
    }

    let cost_basis = Cash::rounded(quantity_sold.value() * position.unit_cost());
    SaleOutcome {
        new_position: Some(Position {
            symbol: position.symbol.clone(),
            quantity: remaining,
            avg_cost: position.avg_cost,
            invested: position.invested.sub(cost_basis),
            opened_at: position.opened_at,
            updated_at: timestamp,
        }),
        cost_basis,
    }
}
