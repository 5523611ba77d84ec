//! Paper Trading Core Simulation.
//!
//! Walks the trade engine through its lifecycle: buys, cost averaging,
//! realized and unrealized PnL, typed rejections, portfolio reporting, and
//! a journal audit. Prices are applied directly to the cache, standing in
//! for the websocket feed.

use papertrade_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    // narration goes to stdout; engine logs stay quiet unless RUST_LOG asks
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("Paper Trading Core Simulation");
    println!("Virtual Cash, Average-Cost Accounting, Persistence-First Commits\n");

    scenario_1_first_buy();
    scenario_2_take_profit();
    scenario_3_cost_averaging();
    scenario_4_typed_rejections();
    scenario_5_portfolio_report();
    scenario_6_journal_audit();

    println!("\nAll simulations completed successfully.");
}

fn new_engine() -> (TradeEngine, Arc<PriceCache>) {
    let prices = Arc::new(PriceCache::new());
    let engine = TradeEngine::new(
        Arc::new(InstrumentCatalog::default_universe()),
        Arc::clone(&prices),
        Arc::new(MemorySink::new()),
        TradingConfig::default(),
    );
    (engine, prices)
}

fn set_price(prices: &PriceCache, symbol: &str, last: Decimal) {
    prices.apply(
        Symbol::from(symbol),
        Quote::new(
            Price::new_unchecked(last),
            Decimal::ZERO,
            Decimal::ZERO,
            Timestamp::now(),
        ),
    );
}

/// A first buy: fee inside the spend, quantity floored to the asset step.
fn scenario_1_first_buy() {
    println!("Scenario 1: First Buy\n");

    let (engine, prices) = new_engine();
    set_price(&prices, "BTC", dec!(50000));
    let account = engine.create_account();

    println!("  Account opens with ${}", engine.balance(account).unwrap());
    println!("  BTC quoted at $50,000\n");

    let receipt = engine.buy_by_amount(account, "BTC", dec!(1000)).unwrap();
    println!("  {}", receipt.summary);

    let position = engine.position(account, "BTC").unwrap();
    println!(
        "  Position: {} BTC, invested ${}, average cost ${}",
        position.quantity,
        position.invested,
        position.avg_cost.round_dp(2)
    );
    println!("  Cash balance: ${}\n", engine.balance(account).unwrap());
}

/// Price rises, the preview prices the exit, sell-all realizes it.
fn scenario_2_take_profit() {
    println!("Scenario 2: Take Profit\n");

    let (engine, prices) = new_engine();
    set_price(&prices, "BTC", dec!(50000));
    let account = engine.create_account();

    engine.buy_by_amount(account, "BTC", dec!(1000)).unwrap();
    println!("  Bought $1,000 of BTC at $50,000");

    set_price(&prices, "BTC", dec!(55000));
    let report = engine.account_report(account).unwrap();
    let held = &report.positions[0];
    println!(
        "  BTC rises to $55,000: market value ${}, unrealized ${}",
        held.market_value.unwrap(),
        held.unrealized_pnl.unwrap()
    );

    let plan = engine
        .preview(account, "BTC", Side::Sell, Sizing::All)
        .unwrap();
    println!(
        "  Preview: selling {} BTC nets ${} after a ${} fee",
        plan.quantity, plan.total, plan.fee
    );

    let receipt = engine.sell_all(account, "BTC").unwrap();
    println!("  {}", receipt.summary);
    println!(
        "  Realized PnL ${}, final balance ${}\n",
        receipt.trade.realized_pnl.unwrap(),
        engine.balance(account).unwrap()
    );
}

/// Two fills at different prices; the average tracks invested cash, not the
/// midpoint of the fills.
fn scenario_3_cost_averaging() {
    println!("Scenario 3: Cost Averaging\n");

    let (engine, prices) = new_engine();
    set_price(&prices, "BTC", dec!(50000));
    let account = engine.create_account_with_balance(Cash::new(dec!(20000)));

    engine.buy_by_quantity(account, "BTC", dec!(0.1)).unwrap();
    println!("  Bought 0.1 BTC at $50,000");

    set_price(&prices, "BTC", dec!(60000));
    engine.buy_by_quantity(account, "BTC", dec!(0.1)).unwrap();
    println!("  Bought 0.1 BTC at $60,000");

    let position = engine.position(account, "BTC").unwrap();
    println!(
        "  Holding {} BTC, invested ${} (fees in the basis)",
        position.quantity, position.invested
    );
    println!(
        "  Average cost ${} vs the $55,000 fill midpoint",
        position.avg_cost.round_dp(2)
    );

    let receipt = engine.sell_by_amount(account, "BTC", dec!(3000)).unwrap();
    println!("  {}", receipt.summary);

    let position = engine.position(account, "BTC").unwrap();
    println!(
        "  Remaining {} BTC, invested ${}\n",
        position.quantity, position.invested
    );
}

/// Every rejection is typed and carries its numbers; none of them move state.
fn scenario_4_typed_rejections() {
    println!("Scenario 4: Typed Rejections\n");

    let (engine, prices) = new_engine();
    set_price(&prices, "BTC", dec!(50000));
    let account = engine.create_account();

    let attempts: [(&str, TradeError); 5] = [
        (
            "spend more than the balance",
            engine.buy_by_amount(account, "BTC", dec!(20000)).unwrap_err(),
        ),
        (
            "sell BTC that is not held",
            engine.sell_by_quantity(account, "BTC", dec!(1)).unwrap_err(),
        ),
        (
            "trade below the venue minimum",
            engine.buy_by_amount(account, "BTC", dec!(0.50)).unwrap_err(),
        ),
        (
            "trade an unknown listing",
            engine.buy_by_amount(account, "DOGE2", dec!(100)).unwrap_err(),
        ),
        (
            "trade a listing nobody has quoted",
            engine.buy_by_amount(account, "ETH", dec!(100)).unwrap_err(),
        ),
    ];

    for (what, err) in attempts {
        println!("  {} -> {}", what, err);
    }

    println!(
        "\n  Balance untouched: ${}, trades recorded: {}\n",
        engine.balance(account).unwrap(),
        engine.trades(account, 10).unwrap().len()
    );
}

/// Multi-instrument portfolio with a marked-to-market equity figure.
fn scenario_5_portfolio_report() {
    println!("Scenario 5: Portfolio Report\n");

    let (engine, prices) = new_engine();
    set_price(&prices, "BTC", dec!(50000));
    set_price(&prices, "ETH", dec!(3000));
    set_price(&prices, "SOL", dec!(150));
    let account = engine.create_account();

    engine.buy_by_amount(account, "BTC", dec!(3000)).unwrap();
    engine.buy_by_amount(account, "ETH", dec!(2000)).unwrap();
    engine.buy_by_quantity(account, "SOL", dec!(10)).unwrap();

    print_report(&engine, account, "after the buys");

    set_price(&prices, "SOL", dec!(180));
    print_report(&engine, account, "after SOL runs to $180");
    println!();
}

fn print_report(engine: &TradeEngine, account: AccountId, when: &str) {
    let report = engine.account_report(account).unwrap();
    println!("  Portfolio {}:", when);
    for position in &report.positions {
        println!(
            "    {} {} invested ${} now ${} ({}{})",
            position.quantity,
            position.symbol,
            position.invested,
            position.market_value.unwrap(),
            if position.unrealized_pnl.unwrap().is_negative() { "" } else { "+" },
            position.unrealized_pnl.unwrap()
        );
    }
    println!(
        "    cash ${}, equity ${}, fees paid ${}",
        report.balance, report.equity, report.totals.fees
    );
}

/// Replay the journal from the opening balance; it must land exactly on the
/// live balance.
fn scenario_6_journal_audit() {
    println!("Scenario 6: Journal Audit\n");

    let (engine, prices) = new_engine();
    set_price(&prices, "BTC", dec!(50000));
    set_price(&prices, "ETH", dec!(3000));
    let account = engine.create_account();

    let moves = [
        ("BTC", dec!(49500)),
        ("BTC", dec!(50500)),
        ("ETH", dec!(2950)),
        ("BTC", dec!(51200)),
        ("ETH", dec!(3080)),
    ];

    for (symbol, price) in moves {
        set_price(&prices, symbol, price);
        engine.buy_by_amount(account, symbol, dec!(500)).unwrap();
    }
    engine.sell_by_quantity(account, "BTC", dec!(0.01)).unwrap();
    engine.sell_all(account, "ETH").unwrap();

    let trades = engine.trades(account, usize::MAX).unwrap();
    let replayed = trades
        .iter()
        .fold(dec!(10000), |acc, t| acc + t.signed_total().value());
    let live = engine.balance(account).unwrap().value();

    println!("  {} trades journaled", trades.len());
    for trade in &trades {
        println!(
            "    #{} {} {} {} total ${} balance ${} -> ${}",
            trade.id.0,
            trade.side,
            trade.quantity,
            trade.symbol,
            trade.total,
            trade.balance_before,
            trade.balance_after
        );
    }

    let totals = engine.account_report(account).unwrap().totals;
    println!(
        "  Totals: bought ${}, sold ${}, fees ${}, realized ${}",
        totals.bought, totals.sold, totals.fees, totals.realized_pnl
    );
    println!(
        "  Replay from $10,000: ${} vs live ${} -> {}",
        replayed,
        live,
        if replayed == live { "reconciled" } else { "MISMATCH" }
    );
}
