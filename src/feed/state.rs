// 11.3: connection lifecycle. Streaming is distinct from Subscribed because
// an acked subscription proves the server heard us, while only a first valid
// ticker proves data is actually flowing.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnState {
    Disconnected = 0,
    Connecting = 1,
    Subscribed = 2,
    Streaming = 3,
    Reconnecting = 4,
}

impl ConnState {
    /// Whether `next` is a legal move from this state. Staying put is always
    /// legal. Connecting -> Streaming is allowed for servers that skip the
    /// ack and start pushing tickers straight away.
    pub fn may_enter(self, next: ConnState) -> bool {
        use ConnState::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Subscribed)
                | (Connecting, Streaming)
                | (Connecting, Reconnecting)
                | (Connecting, Disconnected)
                | (Subscribed, Streaming)
                | (Subscribed, Reconnecting)
                | (Subscribed, Disconnected)
                | (Streaming, Reconnecting)
                | (Streaming, Disconnected)
                | (Reconnecting, Connecting)
                | (Reconnecting, Disconnected)
        )
    }

    /// Live means a socket is open and subscribed.
    pub fn is_live(self) -> bool {
        matches!(self, ConnState::Subscribed | ConnState::Streaming)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> ConnState {
        match raw {
            1 => ConnState::Connecting,
            2 => ConnState::Subscribed,
            3 => ConnState::Streaming,
            4 => ConnState::Reconnecting,
            _ => ConnState::Disconnected,
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnState::Disconnected => "disconnected",
            ConnState::Connecting => "connecting",
            ConnState::Subscribed => "subscribed",
            ConnState::Streaming => "streaming",
            ConnState::Reconnecting => "reconnecting",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnState::*;

    #[test]
    fn happy_path_transitions() {
        assert!(Disconnected.may_enter(Connecting));
        assert!(Connecting.may_enter(Subscribed));
        assert!(Subscribed.may_enter(Streaming));
        assert!(Streaming.may_enter(Reconnecting));
        assert!(Reconnecting.may_enter(Connecting));
        assert!(Streaming.may_enter(Disconnected));
    }

    #[test]
    fn illegal_transitions() {
        assert!(!Disconnected.may_enter(Streaming));
        assert!(!Disconnected.may_enter(Subscribed));
        assert!(!Streaming.may_enter(Subscribed));
        assert!(!Streaming.may_enter(Connecting));
        assert!(!Reconnecting.may_enter(Streaming));
    }

    #[test]
    fn ack_skip_is_legal() {
        // some providers push data before (or instead of) an ack
        assert!(Connecting.may_enter(Streaming));
    }

    #[test]
    fn liveness() {
        assert!(Subscribed.is_live());
        assert!(Streaming.is_live());
        assert!(!Connecting.is_live());
        assert!(!Reconnecting.is_live());
        assert!(!Disconnected.is_live());
    }

    #[test]
    fn u8_round_trip() {
        for state in [Disconnected, Connecting, Subscribed, Streaming, Reconnecting] {
            assert_eq!(ConnState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ConnState::from_u8(99), Disconnected);
    }
}
