// 7.0: trade sizing and fees. every request shape reduces to a TradePlan
// here, computed once; execution and preview both use the plan verbatim, so
// what a caller is shown is exactly what commits.
//
// the rounding asymmetry is deliberate and load-bearing: quantity floors on
// buy-by-amount (never grant more asset than paid for) and ceils on
// sell-by-amount (never net the seller less than asked). money rounds to
// cents half-up everywhere.

use crate::types::{Cash, Price, Qty, Side, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// The resolved arithmetic of one prospective trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradePlan {
    pub side: Side,
    pub symbol: Symbol,
    pub quantity: Qty,
    pub price: Price,
    /// Asset value before the fee. For buy-by-amount this is spend − fee and
    /// absorbs the sub-step floor residue; otherwise it is quantity × price
    /// rounded to cents.
    pub gross: Cash,
    pub fee: Cash,
    /// Absolute cash that will move on the account: gross + fee for buys
    /// (exactly the requested spend on buy-by-amount), gross − fee for sells.
    pub total: Cash,
}

/// `amount × fee_percentage / 100`, cents, half-up. A zero rate short-circuits
/// so a zero-fee venue never picks up rounding artifacts.
pub fn fee_for(amount: Cash, fee_pct: Decimal) -> Cash {
    if fee_pct.is_zero() {
        return Cash::zero();
    }
    Cash::rounded(amount.value() * fee_pct / dec!(100))
}

// 7.1: buy sized by cash spend. the fee comes out of the spend, the remainder
// buys asset, and the quantity floors to the canonical step. the account is
// debited exactly `spend`.
pub fn plan_buy_by_amount(symbol: &Symbol, spend: Cash, price: Price, fee_pct: Decimal) -> TradePlan {
    debug_assert!(spend.value() > Decimal::ZERO);

    let fee = fee_for(spend, fee_pct);
    let net = spend.sub(fee);
    let quantity = Qty::floor_raw(net.value() / price.value());
    TradePlan {
        side: Side::Buy,
        symbol: symbol.clone(),
        quantity,
        price,
        gross: net,
        fee,
        total: spend,
    }
}

// 7.2: buy sized by quantity. the subtotal is derived from the quantity and
// the fee goes on top, so the debit is subtotal + fee.
pub fn plan_buy_by_quantity(
    symbol: &Symbol,
    quantity: Qty,
    price: Price,
    fee_pct: Decimal,
) -> TradePlan {
    debug_assert!(quantity.value() > Decimal::ZERO);

    let gross = Cash::rounded(quantity.value() * price.value());
    let fee = fee_for(gross, fee_pct);
    TradePlan {
        side: Side::Buy,
        symbol: symbol.clone(),
        quantity,
        price,
        gross,
        fee,
        total: gross.add(fee),
    }
}

// 7.3: sell sized by the net cash the caller wants to receive. the fee is
// computed on the requested net, the gross target adds it back, and the
// quantity ceils so the realized gross covers the target. credit is
// gross − fee and never lands under the request.
pub fn plan_sell_by_amount(
    symbol: &Symbol,
    desired_net: Cash,
    price: Price,
    fee_pct: Decimal,
) -> TradePlan {
    debug_assert!(desired_net.value() > Decimal::ZERO);

    let fee = fee_for(desired_net, fee_pct);
    let gross_target = desired_net.add(fee);
    let quantity = Qty::ceil_raw(gross_target.value() / price.value());
    let gross = Cash::rounded(quantity.value() * price.value());
    TradePlan {
        side: Side::Sell,
        symbol: symbol.clone(),
        quantity,
        price,
        gross,
        fee,
        total: gross.sub(fee),
    }
}

// 7.4: sell sized by quantity. gross from the quantity, fee on the gross,
// credit is what remains.
pub fn plan_sell_by_quantity(
    symbol: &Symbol,
    quantity: Qty,
    price: Price,
    fee_pct: Decimal,
) -> TradePlan {
    debug_assert!(quantity.value() > Decimal::ZERO);

    let gross = Cash::rounded(quantity.value() * price.value());
    let fee = fee_for(gross, fee_pct);
    TradePlan {
        side: Side::Sell,
        symbol: symbol.clone(),
        quantity,
        price,
        gross,
        fee,
        total: gross.sub(fee),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::from("BTC")
    }

    fn price(p: Decimal) -> Price {
        Price::new_unchecked(p)
    }

    #[test]
    fn fee_rounds_half_up_to_cents() {
        assert_eq!(fee_for(Cash::new(dec!(1000)), dec!(0.10)).value(), dec!(1.00));
        assert_eq!(fee_for(Cash::new(dec!(505)), dec!(0.10)).value(), dec!(0.51));
        assert_eq!(fee_for(Cash::new(dec!(1234.56)), dec!(0.10)).value(), dec!(1.23));
        assert_eq!(fee_for(Cash::new(dec!(1098.90)), dec!(0.10)).value(), dec!(1.10));
    }

    #[test]
    fn zero_rate_short_circuits() {
        let fee = fee_for(Cash::new(dec!(999.995)), Decimal::ZERO);
        assert!(fee.is_zero());
        // and the plan carries the full spend into asset
        let plan = plan_buy_by_amount(&btc(), Cash::new(dec!(1000)), price(dec!(50000)), dec!(0));
        assert_eq!(plan.gross.value(), dec!(1000));
        assert_eq!(plan.quantity.value(), dec!(0.02));
    }

    #[test]
    fn buy_by_amount_thousand_at_fifty_thousand() {
        let plan = plan_buy_by_amount(&btc(), Cash::new(dec!(1000.00)), price(dec!(50000)), dec!(0.10));
        assert_eq!(plan.fee.value(), dec!(1.00));
        // (1000 - 1) / 50000 = 0.01998, already on the step
        assert_eq!(plan.quantity.value(), dec!(0.01998000));
        assert_eq!(plan.gross.value(), dec!(999.00));
        assert_eq!(plan.total.value(), dec!(1000.00));
    }

    #[test]
    fn buy_by_amount_floors_the_quantity() {
        let plan = plan_buy_by_amount(&btc(), Cash::new(dec!(1000.00)), price(dec!(7000)), dec!(0.10));
        // 999 / 7000 = 0.142714285714... → floors to 8 digits
        assert_eq!(plan.quantity.value(), dec!(0.14271428));
        // the floored quantity never costs more than the net spend
        assert!(plan.quantity.value() * dec!(7000) <= dec!(999.00));
        assert_eq!(plan.total.value(), dec!(1000.00));
    }

    #[test]
    fn buy_by_quantity_puts_fee_on_top() {
        let plan = plan_buy_by_quantity(&btc(), Qty::new_unchecked(dec!(0.5)), price(dec!(50000)), dec!(0.10));
        assert_eq!(plan.gross.value(), dec!(25000.00));
        assert_eq!(plan.fee.value(), dec!(25.00));
        assert_eq!(plan.total.value(), dec!(25025.00));
    }

    #[test]
    fn sell_by_quantity_nets_fee_out() {
        let plan = plan_sell_by_quantity(
            &btc(),
            Qty::new_unchecked(dec!(0.01998)),
            price(dec!(55000)),
            dec!(0.10),
        );
        assert_eq!(plan.gross.value(), dec!(1098.90));
        assert_eq!(plan.fee.value(), dec!(1.10));
        assert_eq!(plan.total.value(), dec!(1097.80));
    }

    #[test]
    fn sell_by_amount_exact_step() {
        let plan = plan_sell_by_amount(&btc(), Cash::new(dec!(1000.00)), price(dec!(55000)), dec!(0.10));
        assert_eq!(plan.fee.value(), dec!(1.00));
        // (1000 + 1) / 55000 = 0.0182, on the step already
        assert_eq!(plan.quantity.value(), dec!(0.01820000));
        assert_eq!(plan.gross.value(), dec!(1001.00));
        assert_eq!(plan.total.value(), dec!(1000.00));
    }

    #[test]
    fn sell_by_amount_ceils_and_never_nets_under() {
        let plan = plan_sell_by_amount(&btc(), Cash::new(dec!(1000.00)), price(dec!(52123)), dec!(0.10));
        // 1001 / 52123 has a long tail; the quantity ceils to cover it
        assert!(plan.quantity.value() * dec!(52123) >= dec!(1001.00));
        assert!(plan.total.value() >= dec!(1000.00));
        assert_eq!(plan.quantity.value().scale(), 8);
    }
}
