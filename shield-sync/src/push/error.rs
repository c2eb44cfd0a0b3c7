use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures of the push channel. None of these reach subscribers; the
/// connection loop logs them and reconnects.
#[derive(Debug, Error)]
pub enum PushError {
    /// Handshake or protocol failure from tungstenite.
    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    /// Failure reported by a non-WebSocket transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The push URL does not parse.
    #[error("invalid push URL '{url}'")]
    InvalidUrl {
        /// Rejected value.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The URL is not `ws://` or `wss://`.
    #[error("unsupported push URL scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),
}

impl From<tungstenite::Error> for PushError {
    fn from(err: tungstenite::Error) -> Self {
        PushError::WebSocket(Box::new(err))
    }
}
