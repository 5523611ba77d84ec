// 11.0: the connector task. one tokio task owns the socket, the reconnect
// policy, and the state machine; everything else talks to it through the
// command channel or reads the shared cache/telemetry. no locks around
// connection state because only this task touches it.

use crate::config::FeedConfig;
use crate::events::PriceEvent;
use crate::feed::backoff::ReconnectPolicy;
use crate::feed::messages::{FeedMessage, SubscribeRequest};
use crate::feed::state::ConnState;
use crate::feed::telemetry::{FeedStatus, FeedTelemetry};
use crate::instrument::InstrumentCatalog;
use crate::quote::{PriceCache, Quote};
use crate::types::{Price, Timestamp};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, info, warn};

/// Control messages accepted by the connector task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
    /// Tear down the current connection and dial again with a fresh attempt
    /// counter.
    ForceReconnect,
    /// Close the connection and stop. No further reconnects are scheduled.
    Shutdown,
}

/// Why a connection session ended abnormally.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("server closed the connection (code {code}): {reason}")]
    ServerClosed { code: u16, reason: String },
    #[error("stream ended without a close frame")]
    StreamEnded,
    #[error("no data for {silent_ms}ms")]
    Stale { silent_ms: u64 },
}

impl FeedError {
    /// Throttle signals get the fixed cooldown instead of the backoff ramp.
    /// Recognized markers: close code 1013 (try again later), an HTTP 429
    /// during the handshake, or throttle wording in the close reason.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            FeedError::ServerClosed { code, reason } => {
                if *code == 1013 {
                    return true;
                }
                let reason = reason.to_ascii_lowercase();
                reason.contains("rate limit") || reason.contains("too many requests")
            }
            FeedError::WebSocket(WsError::Http(response)) => response.status().as_u16() == 429,
            _ => false,
        }
    }
}

enum SessionEnd {
    Shutdown,
    Restart,
}

enum Wait {
    Done,
    Shutdown,
}

/// Handle returned by [`FeedConnector::spawn`]. Dropping it does not stop
/// the task; call [`FeedHandle::shutdown`] for that.
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    events: broadcast::Sender<PriceEvent>,
    telemetry: Arc<FeedTelemetry>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Telemetry snapshot as of now.
    pub fn status(&self) -> FeedStatus {
        self.telemetry.status(Timestamp::now())
    }

    pub fn telemetry(&self) -> Arc<FeedTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// New subscription to the price event stream. Slow receivers lag and
    /// lose old events rather than slowing the connector down.
    pub fn subscribe(&self) -> broadcast::Receiver<PriceEvent> {
        self.events.subscribe()
    }

    pub async fn force_reconnect(&self) {
        let _ = self.commands.send(FeedCommand::ForceReconnect).await;
    }

    /// Stop the connector and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(FeedCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

pub struct FeedConnector {
    config: FeedConfig,
    catalog: Arc<InstrumentCatalog>,
    cache: Arc<PriceCache>,
    events: broadcast::Sender<PriceEvent>,
    telemetry: Arc<FeedTelemetry>,
    commands: mpsc::Receiver<FeedCommand>,
    policy: ReconnectPolicy,
    state: ConnState,
    last_dial: Option<Instant>,
}

impl FeedConnector {
    /// Start the connector task. It dials immediately and keeps itself
    /// connected until [`FeedHandle::shutdown`].
    pub fn spawn(
        config: FeedConfig,
        catalog: Arc<InstrumentCatalog>,
        cache: Arc<PriceCache>,
    ) -> FeedHandle {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (events_tx, _) = broadcast::channel(config.event_buffer);
        let telemetry = Arc::new(FeedTelemetry::new());
        let policy = ReconnectPolicy::new(&config);

        let connector = FeedConnector {
            config,
            catalog,
            cache,
            events: events_tx.clone(),
            telemetry: Arc::clone(&telemetry),
            commands: commands_rx,
            policy,
            state: ConnState::Disconnected,
            last_dial: None,
        };
        let task = tokio::spawn(connector.run());

        FeedHandle {
            commands: commands_tx,
            events: events_tx,
            telemetry,
            task,
        }
    }

    async fn run(mut self) {
        info!(url = %self.config.url, "price feed connector started");
        loop {
            // commands that arrived between sessions
            match self.commands.try_recv() {
                Ok(FeedCommand::Shutdown) => break,
                Ok(FeedCommand::ForceReconnect) => {
                    self.policy.reset();
                    self.telemetry.set_attempts(0);
                }
                Err(_) => {}
            }

            self.enter(ConnState::Connecting);
            match self.session().await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Restart) => {
                    // operator restart: skip the backoff wait, keep the
                    // dial pacing
                    self.enter(ConnState::Reconnecting);
                }
                Err(err) => {
                    self.enter(ConnState::Reconnecting);
                    let pause = if err.is_rate_limit() {
                        let pause = self.policy.on_rate_limit();
                        warn!(
                            error = %err,
                            pause_ms = pause.as_millis() as u64,
                            "feed rate limited, cooling down"
                        );
                        pause
                    } else {
                        let pause = self.policy.on_failure();
                        if self.policy.attempt() == 0 {
                            warn!(
                                error = %err,
                                pause_ms = pause.as_millis() as u64,
                                "retry cycle exhausted, taking a long pause"
                            );
                        } else {
                            warn!(
                                error = %err,
                                attempt = self.policy.attempt(),
                                pause_ms = pause.as_millis() as u64,
                                "feed connection lost"
                            );
                        }
                        pause
                    };
                    self.telemetry.set_attempts(self.policy.attempt());
                    if let Wait::Shutdown = self.wait(pause).await {
                        break;
                    }
                }
            }
        }
        self.enter(ConnState::Disconnected);
        info!("price feed connector stopped");
    }

    /// One connection from dial to teardown.
    async fn session(&mut self) -> Result<SessionEnd, FeedError> {
        self.pace().await;

        debug!(url = %self.config.url, "dialing feed");
        let dial = timeout(self.config.connect_timeout(), connect_async(&self.config.url))
            .await
            .map_err(|_| FeedError::ConnectTimeout(self.config.connect_timeout()))?;
        let (stream, _response) = dial?;
        let (mut write, mut read) = stream.split();

        let codes = self.catalog.active_feed_codes();
        let request = serde_json::to_string(&SubscribeRequest::new(&self.config.channel, &codes))?;
        write.send(Message::Text(request)).await?;
        info!(
            instruments = codes.len(),
            channel = %self.config.channel,
            "subscribe request sent"
        );

        // liveness clock, refreshed by every recognized application frame
        let mut liveness = Instant::now();
        let mut watchdog = interval(self.config.watchdog_period());
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(FeedCommand::Shutdown) | None => {
                        info!("shutdown requested, closing feed socket");
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                    Some(FeedCommand::ForceReconnect) => {
                        info!("operator forced a reconnect");
                        self.policy.reset();
                        self.telemetry.set_attempts(0);
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Restart);
                    }
                },
                _ = watchdog.tick() => {
                    let silent = liveness.elapsed();
                    if silent >= self.config.stale_after() {
                        let silent_ms = silent.as_millis() as u64;
                        warn!(silent_ms, "feed went quiet, tearing the connection down");
                        let _ = write.send(Message::Close(None)).await;
                        return Err(FeedError::Stale { silent_ms });
                    }
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if self.on_frame(&text) {
                            liveness = Instant::now();
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = String::from_utf8(data) {
                            if self.on_frame(&text) {
                                liveness = Instant::now();
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        // transport liveness only; the application clock
                        // waits for real frames
                        write.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (1005, String::new()),
                        };
                        return Err(FeedError::ServerClosed { code, reason });
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => return Err(FeedError::StreamEnded),
                },
            }
        }
    }

    /// Dispatch one inbound text frame. Returns whether the frame was a
    /// recognized message class; only those refresh the liveness clock.
    fn on_frame(&mut self, text: &str) -> bool {
        let message = match FeedMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "dropping malformed frame");
                return false;
            }
        };

        let now = Timestamp::now();
        let recognized = match message {
            FeedMessage::Subscribed { channel, instruments } => {
                info!(
                    channel = %channel,
                    instruments = instruments.len(),
                    "subscription acknowledged"
                );
                self.telemetry.set_subscribed(instruments.len());
                self.enter(ConnState::Subscribed);
                true
            }
            FeedMessage::Ticker {
                symbol,
                last,
                change,
                change_pct,
                ..
            } => {
                self.on_ticker(&symbol, last, change, change_pct, now);
                true
            }
            FeedMessage::Heartbeat { .. } => {
                debug!("heartbeat");
                self.telemetry.mark_heartbeat(now);
                true
            }
            FeedMessage::Unknown => {
                debug!("ignoring unrecognized message type");
                false
            }
        };

        if recognized {
            self.telemetry.mark_seen(now);
        }
        recognized
    }

    /// Apply one ticker: resolve the feed code, validate the price, write
    /// the cache, publish the event. Acceptance is exactly `price > 0`.
    fn on_ticker(
        &mut self,
        feed_code: &str,
        last: Decimal,
        change: Decimal,
        change_pct: Decimal,
        now: Timestamp,
    ) {
        let Some(instrument) = self.catalog.resolve_feed_code(feed_code) else {
            debug!(feed_code = %feed_code, "ticker for an unlisted instrument");
            return;
        };
        let Some(price) = Price::new(last) else {
            warn!(
                symbol = %instrument.symbol,
                price = %last,
                "rejecting non-positive ticker price"
            );
            return;
        };
        let symbol = instrument.symbol.clone();

        let quote = Quote::new(price, change, change_pct, now);
        self.cache.apply(symbol.clone(), quote);
        self.telemetry.mark_update(now);

        if self.state != ConnState::Streaming {
            self.enter(ConnState::Streaming);
            self.policy.reset();
            self.telemetry.set_attempts(0);
            info!("first ticker applied, feed is streaming");
        }

        // send only fails when nobody is listening, which is fine
        let _ = self.events.send(PriceEvent::from_quote(symbol, &quote));
    }

    /// Backoff wait that still answers commands. A forced reconnect cuts
    /// the wait short.
    async fn wait(&mut self, pause: Duration) -> Wait {
        tokio::select! {
            _ = sleep(pause) => Wait::Done,
            cmd = self.commands.recv() => match cmd {
                Some(FeedCommand::ForceReconnect) => {
                    info!("reconnect forced, skipping the rest of the wait");
                    self.policy.reset();
                    self.telemetry.set_attempts(0);
                    Wait::Done
                }
                Some(FeedCommand::Shutdown) | None => Wait::Shutdown,
            }
        }
    }

    /// Floor between dials so a tight failure loop cannot hammer the
    /// endpoint.
    async fn pace(&mut self) {
        if let Some(last) = self.last_dial {
            let since = last.elapsed();
            let floor = self.config.min_connect_interval();
            if since < floor {
                sleep(floor - since).await;
            }
        }
        self.last_dial = Some(Instant::now());
    }

    fn enter(&mut self, next: ConnState) {
        if self.state == next || !self.state.may_enter(next) {
            return;
        }
        debug!(from = %self.state, to = %next, "feed state change");
        self.state = next;
        self.telemetry.set_state(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_code_1013_is_a_rate_limit() {
        let err = FeedError::ServerClosed {
            code: 1013,
            reason: String::new(),
        };
        assert!(err.is_rate_limit());
    }

    #[test]
    fn throttle_wording_is_a_rate_limit() {
        let err = FeedError::ServerClosed {
            code: 1000,
            reason: "Rate limit exceeded, slow down".to_string(),
        };
        assert!(err.is_rate_limit());

        let err = FeedError::ServerClosed {
            code: 1008,
            reason: "too many requests".to_string(),
        };
        assert!(err.is_rate_limit());
    }

    #[test]
    fn handshake_429_is_a_rate_limit() {
        let response = tokio_tungstenite::tungstenite::http::Response::builder()
            .status(429)
            .body(None)
            .unwrap();
        assert!(FeedError::WebSocket(WsError::Http(response)).is_rate_limit());
    }

    #[test]
    fn ordinary_failures_are_not_rate_limits() {
        assert!(!FeedError::StreamEnded.is_rate_limit());
        assert!(!FeedError::Stale { silent_ms: 15_000 }.is_rate_limit());
        assert!(!FeedError::ServerClosed {
            code: 1000,
            reason: "going away".to_string(),
        }
        .is_rate_limit());
        assert!(!FeedError::ConnectTimeout(Duration::from_secs(10)).is_rate_limit());
    }
}
