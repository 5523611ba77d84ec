// 11.0: market data ingestion. a single task owns the upstream websocket and
// keeps itself alive: linear backoff with a rate-limit bypass, a staleness
// watchdog, and telemetry counters the rest of the process can read.

mod backoff;
mod connector;
mod messages;
mod state;
mod telemetry;

pub use backoff::ReconnectPolicy;
pub use connector::{FeedCommand, FeedConnector, FeedError, FeedHandle};
pub use messages::{FeedMessage, SubscribeRequest};
pub use state::ConnState;
pub use telemetry::{FeedStatus, FeedTelemetry};
