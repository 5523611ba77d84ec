// 1.0: all the primitives live here. nothing above works without these types.
// symbols, ids, prices, cash, quantities, timestamps. each is a newtype so the
// compiler catches unit mixups, and the two rounding policies are pinned here.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::iter::Sum;

// currency amounts carry 2 fractional digits, asset quantities carry 8.
pub const CASH_DP: u32 = 2;
pub const QTY_DP: u32 = 8;

// 1.1: instrument key, e.g. "BTC". Borrow<str> so maps keyed by Symbol
// answer &str lookups without an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

// Buy spends cash for asset, Sell does the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    // sign of the cash flow on the account: buys debit, sells credit.
    pub fn cash_sign(&self) -> Decimal {
        match self {
            Side::Buy => dec!(-1),
            Side::Sell => dec!(1),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// 1.2: price in cash per unit of asset. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: cash amount. balances, fees, proceeds, pnl all use this.
// canonical form is 2 fractional digits; `rounded` is the only way money
// leaves full-precision intermediate math (half-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cash(Decimal);

impl Cash {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn rounded(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(CASH_DP, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Cash) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Cash) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sum for Cash {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, c| acc.add(c))
    }
}

impl<'a> Sum<&'a Cash> for Cash {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, c| acc.add(*c))
    }
}

// 1.4: asset quantity, never negative. canonical form is 8 fractional digits.
// the floor/ceil constructors are the two sizing policies: floor when the
// system grants asset (never give more than paid for), ceil when the system
// sizes a sale to hit a requested net (never net the seller less than asked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qty(Decimal);

impl Qty {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn floor_raw(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value.round_dp_with_strategy(QTY_DP, RoundingStrategy::ToZero))
    }

    pub fn ceil_raw(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value.round_dp_with_strategy(QTY_DP, RoundingStrategy::AwayFromZero))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Qty) -> Self {
        Self(self.0 + other.0)
    }

    #[must_use]
    pub fn checked_sub(&self, other: Qty) -> Option<Self> {
        Self::new(self.0 - other.0)
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    // age of `self` as seen from `later`, clamped at zero for skewed clocks.
    pub fn age_ms(&self, later: Timestamp) -> i64 {
        (later.0 - self.0).max(0)
    }
}
