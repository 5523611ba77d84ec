// 11.1: wire types for the upstream market data stream. one outbound shape
// (the batch subscribe), three recognized inbound shapes, and a tolerant
// catch-all so new server-side message types never kill a session.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Batch subscription request. Sent once per connection, immediately after
/// the handshake, naming every active instrument.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    pub op: &'static str,
    pub channel: &'a str,
    pub instruments: &'a [String],
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(channel: &'a str, instruments: &'a [String]) -> Self {
        Self {
            op: "subscribe",
            channel,
            instruments,
        }
    }
}

/// Inbound frames, dispatched on the `type` tag.
///
/// `Ticker.symbol` is the provider's feed code (e.g. `BTCUSDT`), not our
/// listing symbol; the connector resolves it through the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Subscribed {
        channel: String,
        #[serde(default)]
        instruments: Vec<String>,
    },
    Ticker {
        symbol: String,
        last: Decimal,
        #[serde(default)]
        change: Decimal,
        #[serde(default)]
        change_pct: Decimal,
        #[serde(default)]
        ts: Option<i64>,
    },
    Heartbeat {
        #[serde(default)]
        ts: Option<i64>,
    },
    // Anything with a tag we do not know. Kept so the deserializer succeeds
    // and the caller can log-and-skip instead of treating it as corruption.
    #[serde(other)]
    Unknown,
}

impl FeedMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn subscribe_request_wire_shape() {
        let instruments = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let request = SubscribeRequest::new("ticker", &instruments);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains(r#""op":"subscribe""#));
        assert!(json.contains(r#""channel":"ticker""#));
        assert!(json.contains(r#""instruments":["BTCUSDT","ETHUSDT"]"#));
    }

    #[test]
    fn parses_ticker_with_string_and_number_prices() {
        // providers disagree on number formatting; both must work
        let from_strings = FeedMessage::parse(
            r#"{"type":"ticker","symbol":"BTCUSDT","last":"50000.00","change":"-120.5","change_pct":"-0.24"}"#,
        )
        .unwrap();
        match from_strings {
            FeedMessage::Ticker {
                symbol,
                last,
                change,
                change_pct,
                ts,
            } => {
                assert_eq!(symbol, "BTCUSDT");
                assert_eq!(last, dec!(50000.00));
                assert_eq!(change, dec!(-120.5));
                assert_eq!(change_pct, dec!(-0.24));
                assert_eq!(ts, None);
            }
            other => panic!("expected ticker, got {other:?}"),
        }

        let from_numbers =
            FeedMessage::parse(r#"{"type":"ticker","symbol":"ETHUSDT","last":3000,"ts":1700000000000}"#)
                .unwrap();
        match from_numbers {
            FeedMessage::Ticker { last, change, ts, .. } => {
                assert_eq!(last, dec!(3000));
                assert_eq!(change, Decimal::ZERO);
                assert_eq!(ts, Some(1_700_000_000_000));
            }
            other => panic!("expected ticker, got {other:?}"),
        }
    }

    #[test]
    fn parses_subscription_ack() {
        let msg = FeedMessage::parse(
            r#"{"type":"subscribed","channel":"ticker","instruments":["BTCUSDT","ETHUSDT","SOLUSDT"]}"#,
        )
        .unwrap();
        match msg {
            FeedMessage::Subscribed { channel, instruments } => {
                assert_eq!(channel, "ticker");
                assert_eq!(instruments.len(), 3);
            }
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn parses_heartbeat() {
        assert!(matches!(
            FeedMessage::parse(r#"{"type":"heartbeat","ts":1700000000000}"#).unwrap(),
            FeedMessage::Heartbeat { ts: Some(_) }
        ));
        assert!(matches!(
            FeedMessage::parse(r#"{"type":"heartbeat"}"#).unwrap(),
            FeedMessage::Heartbeat { ts: None }
        ));
    }

    #[test]
    fn unknown_type_is_tolerated() {
        assert!(matches!(
            FeedMessage::parse(r#"{"type":"trade_burst","symbol":"BTCUSDT"}"#).unwrap(),
            FeedMessage::Unknown
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(FeedMessage::parse("{not json").is_err());
        assert!(FeedMessage::parse(r#"{"type":"ticker","symbol":"BTCUSDT"}"#).is_err()); // no price
    }
}
