// 9.0: outbound events. the connector publishes one PriceEvent per applied
// ticker on a tokio broadcast channel; the notification collaborator fans
// them out to subscribers. emitted on every applied update, not only on value
// change, so downstream consumers can stay idempotent.

use crate::quote::Quote;
use crate::types::{Price, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// field names are the wire contract with the broadcast layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEvent {
    pub symbol: Symbol,
    pub price: Price,
    pub change_24h: Decimal,
    pub change_percent_24h: Decimal,
    /// Epoch milliseconds of the local apply.
    pub timestamp: i64,
}

impl PriceEvent {
    pub fn from_quote(symbol: Symbol, quote: &Quote) -> Self {
        Self {
            symbol,
            price: quote.last,
            change_24h: quote.change_24h,
            change_percent_24h: quote.change_pct_24h,
            timestamp: quote.at.as_millis(),
        }
    }
}
