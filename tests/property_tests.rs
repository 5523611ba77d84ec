//! Property-based tests for the sizing arithmetic and the ledger.
//!
//! These tests verify invariants hold under random inputs.

use papertrade_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

// Strategies for generating test data
fn spend_strategy() -> impl Strategy<Value = Decimal> {
    (1_00i64..=5_000_00i64).prop_map(|x| Decimal::new(x, 2)) // $1.00 to $5,000.00
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1_00i64..=100_000_00i64).prop_map(|x| Decimal::new(x, 2)) // $1.00 to $100,000.00
}

fn qty_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=200_000i64).prop_map(|x| Decimal::new(x, 6)) // 0.000001 to 0.2
}

fn set_price(prices: &PriceCache, symbol: &str, last: Decimal) {
    prices.apply(
        Symbol::from(symbol),
        Quote::new(
            Price::new_unchecked(last),
            Decimal::ZERO,
            Decimal::ZERO,
            Timestamp::from_millis(1),
        ),
    );
}

fn funded_engine(balance: Decimal) -> (TradeEngine, Arc<PriceCache>, AccountId) {
    let prices = Arc::new(PriceCache::new());
    let engine = TradeEngine::new(
        Arc::new(InstrumentCatalog::default_universe()),
        Arc::clone(&prices),
        Arc::new(MemorySink::new()),
        TradingConfig::default(),
    );
    let account = engine.create_account_with_balance(Cash::new(balance));
    (engine, prices, account)
}

const STEP: Decimal = dec!(0.00000001);

proptest! {
    /// Buy-by-amount debits exactly the request and floors the quantity:
    /// the granted asset never exceeds net/price, and granting one more step
    /// would.
    #[test]
    fn buy_by_amount_never_overgrants(
        spend in spend_strategy(),
        price in price_strategy(),
    ) {
        let (engine, prices, account) = funded_engine(dec!(1000000));
        set_price(&prices, "BTC", price);

        match engine.buy_by_amount(account, "BTC", spend) {
            Ok(receipt) => {
                let trade = &receipt.trade;
                prop_assert_eq!(trade.total.value(), spend);

                let net = spend - trade.fee.value();
                let granted = trade.quantity.value() * price;
                prop_assert!(granted <= net, "granted {} > net {}", granted, net);
                prop_assert!(
                    (trade.quantity.value() + STEP) * price > net,
                    "floor left more than one step on the table"
                );
            }
            Err(TradeError::InvalidRequest { .. }) => {
                // only the too-small-to-fill-one-step case may land here
                let net = spend - fee_for(Cash::new(spend), dec!(0.10)).value();
                prop_assert!(net / price < STEP);
            }
            Err(other) => return Err(TestCaseError::fail(format!("unexpected: {other}"))),
        }
    }

    /// Sell-by-amount nets at least the request, overshooting by at most one
    /// quantity step's worth of cash plus cent rounding.
    #[test]
    fn sell_by_amount_never_undershoots(
        net_request in (1_00i64..=1_000_00i64).prop_map(|x| Decimal::new(x, 2)),
        price in price_strategy(),
    ) {
        let (engine, prices, account) = funded_engine(dec!(1000000));
        set_price(&prices, "BTC", price);
        engine.buy_by_amount(account, "BTC", dec!(500000)).unwrap();

        let receipt = engine.sell_by_amount(account, "BTC", net_request).unwrap();
        let total = receipt.trade.total.value();

        prop_assert!(total >= net_request, "netted {} for a {} request", total, net_request);
        prop_assert!(
            total - net_request <= price * STEP + dec!(0.01),
            "overshot the request by {}",
            total - net_request
        );
    }

    /// The fee is the rate applied to the cash figure, to the cent.
    #[test]
    fn fee_tracks_the_rate(amount in (1i64..=100_000_00i64).prop_map(|x| Decimal::new(x, 2))) {
        let fee = fee_for(Cash::new(amount), dec!(0.10)).value();
        let exact = amount * dec!(0.001);
        prop_assert!((fee - exact).abs() <= dec!(0.005));
        prop_assert_eq!(fee_for(Cash::new(amount), Decimal::ZERO).value(), Decimal::ZERO);
    }

    /// Preview and execution agree on every request, priced or rejected.
    #[test]
    fn preview_always_prices_the_commit(
        spend in spend_strategy(),
        price in price_strategy(),
    ) {
        let (engine, prices, account) = funded_engine(dec!(2000));
        set_price(&prices, "BTC", price);

        let previewed = engine.preview(account, "BTC", Side::Buy, Sizing::Amount(spend));
        let executed = engine.buy_by_amount(account, "BTC", spend);

        match (previewed, executed) {
            (Ok(plan), Ok(receipt)) => {
                prop_assert_eq!(plan.quantity, receipt.trade.quantity);
                prop_assert_eq!(plan.fee, receipt.trade.fee);
                prop_assert_eq!(plan.total, receipt.trade.total);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            (a, b) => return Err(TestCaseError::fail(format!(
                "preview and execute disagree: {a:?} vs {b:?}"
            ))),
        }
    }

    /// An arbitrary stream of requests keeps the books consistent: the
    /// journal replays to the live balance, cash never goes negative, and no
    /// position carries a non-positive quantity or negative invested cash.
    #[test]
    fn random_request_stream_reconciles(
        ops in proptest::collection::vec(
            (0u8..4u8, spend_strategy(), qty_strategy(), price_strategy()),
            1..30,
        ),
    ) {
        let (engine, prices, account) = funded_engine(dec!(10000));

        for (op, amount, quantity, price) in ops {
            set_price(&prices, "BTC", price);
            let _ = match op {
                0 => engine.buy_by_amount(account, "BTC", amount),
                1 => engine.buy_by_quantity(account, "BTC", quantity),
                2 => engine.sell_by_quantity(account, "BTC", quantity),
                _ => engine.sell_all(account, "BTC"),
            };
        }

        let balance = engine.balance(account).unwrap().value();
        prop_assert!(balance >= Decimal::ZERO, "cash went negative: {}", balance);

        let trades = engine.trades(account, usize::MAX).unwrap();
        let replayed = trades
            .iter()
            .fold(dec!(10000), |acc, t| acc + t.signed_total().value());
        prop_assert_eq!(replayed, balance);

        let report = engine.account_report(account).unwrap();
        prop_assert_eq!(report.totals.trades, trades.len());
        for position in &report.positions {
            prop_assert!(position.quantity.value() > Decimal::ZERO);
            prop_assert!(position.invested.value() >= Decimal::ZERO);
        }
    }
}
