//! Feed connector integration tests.
//!
//! Each test stands up a loopback websocket server, points the connector at
//! it, and scripts the upstream side: acks, tickers, garbage, silence, and
//! dropped connections. Timings are shrunk so the backoff and watchdog paths
//! run in milliseconds.

use futures_util::{SinkExt, StreamExt};
use papertrade_core::config::FeedConfig;
use papertrade_core::feed::FeedConnector;
use papertrade_core::instrument::InstrumentCatalog;
use papertrade_core::quote::PriceCache;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

const STEP: Duration = Duration::from_secs(5);

/// Config with every delay shrunk to test scale. Stale after 300ms.
fn fast_config(url: String) -> FeedConfig {
    FeedConfig {
        url,
        channel: "ticker".to_string(),
        heartbeat_interval_ms: 100,
        watchdog_period_ms: 50,
        stale_after_factor: 3,
        min_connect_interval_ms: 10,
        connect_timeout_ms: 2_000,
        backoff_base_ms: 10,
        backoff_cap_ms: 30,
        rate_limit_pause_ms: 50,
        max_reconnect_attempts: 5,
        exhausted_pause_ms: 200,
        event_buffer: 64,
    }
}

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Accept one connection and consume the subscribe request the connector
/// sends first. Returns the open server side and the parsed request.
async fn accept_session(listener: &TcpListener) -> (WebSocketStream<TcpStream>, serde_json::Value) {
    let (stream, _) = timeout(STEP, listener.accept()).await.unwrap().unwrap();
    let mut server = tokio_tungstenite::accept_async(stream).await.unwrap();
    let frame = timeout(STEP, server.next()).await.unwrap().unwrap().unwrap();
    let request: serde_json::Value = match frame {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected the subscribe request, got {other:?}"),
    };
    (server, request)
}

async fn send_json(server: &mut WebSocketStream<TcpStream>, json: &str) {
    server.send(Message::Text(json.to_string())).await.unwrap();
}

fn ack(instruments: usize) -> String {
    let codes: Vec<String> = (0..instruments).map(|i| format!("X{i}USDT")).collect();
    serde_json::json!({"type": "subscribed", "channel": "ticker", "instruments": codes}).to_string()
}

fn ticker(feed_code: &str, last: &str) -> String {
    serde_json::json!({
        "type": "ticker",
        "symbol": feed_code,
        "last": last,
        "change": "100.5",
        "change_pct": "0.2",
    })
    .to_string()
}

#[tokio::test]
async fn subscribes_streams_and_publishes() {
    let (listener, url) = listener().await;
    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, Arc::clone(&cache));
    let mut events = handle.subscribe();

    let (mut server, request) = accept_session(&listener).await;
    assert_eq!(request["op"], "subscribe");
    assert_eq!(request["channel"], "ticker");
    assert_eq!(request["instruments"].as_array().unwrap().len(), 20);

    send_json(&mut server, &ack(20)).await;
    send_json(&mut server, &ticker("BTCUSDT", "50000.00")).await;
    send_json(&mut server, &ticker("ETHUSDT", "3000.00")).await;

    // the broadcast carries one event per applied ticker, in order
    let event = timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.symbol.as_str(), "BTC");
    assert_eq!(event.price.value(), dec!(50000.00));
    assert_eq!(event.change_24h, dec!(100.5));
    let event = timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.symbol.as_str(), "ETH");

    // and the cache holds the quotes the events described
    assert_eq!(cache.last_price("BTC").unwrap().value(), dec!(50000.00));
    assert_eq!(cache.last_price("ETH").unwrap().value(), dec!(3000.00));
    assert_eq!(cache.len(), 2);

    let status = handle.status();
    assert!(status.connected);
    assert_eq!(status.subscribed_instruments, 20);
    assert_eq!(status.updates_total, 2);
    assert_eq!(status.reconnect_attempts, 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn garbage_and_bad_prices_are_dropped_without_disconnecting() {
    let (listener, url) = listener().await;
    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, Arc::clone(&cache));
    let mut events = handle.subscribe();

    let (mut server, _) = accept_session(&listener).await;
    send_json(&mut server, &ack(20)).await;

    // malformed json, an unknown message class, a ticker for an unlisted
    // feed code, and two invalid prices
    send_json(&mut server, "{this is not json").await;
    send_json(&mut server, r#"{"type":"order_burst","symbol":"BTCUSDT"}"#).await;
    send_json(&mut server, &ticker("SHIBUSDT", "0.00002")).await;
    send_json(&mut server, &ticker("BTCUSDT", "0")).await;
    send_json(&mut server, &ticker("BTCUSDT", "-5")).await;

    // the session survives all of it; a valid ticker still lands
    send_json(&mut server, &ticker("BTCUSDT", "50000.00")).await;
    let event = timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.symbol.as_str(), "BTC");

    // only the valid update was applied or published
    assert_eq!(cache.len(), 1);
    assert_eq!(handle.status().updates_total, 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn reconnects_after_the_server_drops() {
    let (listener, url) = listener().await;
    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, Arc::clone(&cache));
    let mut events = handle.subscribe();

    let (mut server, _) = accept_session(&listener).await;
    send_json(&mut server, &ack(20)).await;
    send_json(&mut server, &ticker("BTCUSDT", "50000.00")).await;
    timeout(STEP, events.recv()).await.unwrap().unwrap();

    // kill the session from the server side
    server.close(None).await.unwrap();
    drop(server);

    // the connector dials again and the new session resumes updates
    let (mut server, request) = accept_session(&listener).await;
    assert_eq!(request["op"], "subscribe");
    send_json(&mut server, &ack(20)).await;
    send_json(&mut server, &ticker("BTCUSDT", "51000.00")).await;

    let event = timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.price.value(), dec!(51000.00));
    assert_eq!(cache.last_price("BTC").unwrap().value(), dec!(51000.00));
    assert_eq!(handle.status().updates_total, 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn silent_feed_trips_the_watchdog() {
    let (listener, url) = listener().await;
    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, cache);

    // ack and then go quiet: the transport stays open but nothing flows
    let (mut server, _) = accept_session(&listener).await;
    send_json(&mut server, &ack(20)).await;

    // stale threshold is 300ms; the connector must tear down and redial on
    // its own
    let (mut server2, request) = accept_session(&listener).await;
    assert_eq!(request["op"], "subscribe");

    // keep both server halves alive until the redial is observed
    send_json(&mut server2, &ack(20)).await;
    drop(server);

    handle.shutdown().await;
}

#[tokio::test]
async fn force_reconnect_restarts_the_session() {
    let (listener, url) = listener().await;
    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, Arc::clone(&cache));
    let mut events = handle.subscribe();

    let (mut server, _) = accept_session(&listener).await;
    send_json(&mut server, &ack(20)).await;
    send_json(&mut server, &ticker("BTCUSDT", "50000.00")).await;
    timeout(STEP, events.recv()).await.unwrap().unwrap();

    handle.force_reconnect().await;

    // the old session ends from the client side...
    loop {
        match timeout(STEP, server.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        }
    }

    // ...and a fresh one comes up with the attempt counter at zero
    let (mut server, _) = accept_session(&listener).await;
    send_json(&mut server, &ack(20)).await;
    send_json(&mut server, &ticker("BTCUSDT", "52000.00")).await;
    let event = timeout(STEP, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.price.value(), dec!(52000.00));
    assert_eq!(handle.status().reconnect_attempts, 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_reconnecting() {
    let (listener, url) = listener().await;
    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, cache);
    let telemetry = handle.telemetry();

    let (mut server, _) = accept_session(&listener).await;
    send_json(&mut server, &ack(20)).await;

    timeout(STEP, handle.shutdown()).await.unwrap();
    assert!(!telemetry.status(papertrade_core::types::Timestamp::now()).connected);

    // no further dial arrives after shutdown
    let redial = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(redial.is_err(), "connector dialed again after shutdown");
}

#[tokio::test]
async fn unreachable_endpoint_keeps_retrying_until_told_to_stop() {
    // bind then drop so the port refuses connections
    let (listener, url) = listener().await;
    drop(listener);

    let cache = Arc::new(PriceCache::new());
    let catalog = Arc::new(InstrumentCatalog::default_universe());
    let handle = FeedConnector::spawn(fast_config(url), catalog, cache);

    // let several dial/backoff cycles fail
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = handle.status();
    assert!(!status.connected);
    assert_eq!(status.updates_total, 0);
    assert_eq!(status.subscribed_instruments, 0);

    // shutdown still lands promptly from a failing loop
    timeout(STEP, handle.shutdown()).await.unwrap();
}
