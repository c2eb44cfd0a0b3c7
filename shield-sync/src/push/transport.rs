use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use super::PushError;

/// Payload-level view of what arrives on the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame, decoded as UTF-8 JSON when possible.
    Binary(Vec<u8>),
    /// The peer closed the connection.
    Close,
}

/// Incoming frames of one open connection. The stream ending, yielding an
/// error, or yielding [`Frame::Close`] all mean the connection is gone.
pub type FrameStream = BoxStream<'static, Result<Frame, PushError>>;

/// Opens connections to the push channel.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Open one connection to `url`.
    async fn open(&self, url: &Url) -> Result<FrameStream, PushError>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl PushTransport for WsTransport {
    async fn open(&self, url: &Url) -> Result<FrameStream, PushError> {
        let (socket, response) = connect_async(url.as_str()).await?;
        debug!(url = %url, status = %response.status(), "websocket handshake complete");

        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
                Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
                // Control frames are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(err) => Some(Err(PushError::from(err))),
            }
        });

        Ok(frames.boxed())
    }
}
