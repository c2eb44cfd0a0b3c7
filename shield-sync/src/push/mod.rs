//! Push event client.
//!
//! [`PushEventClient`] keeps one connection to the backend push channel open
//! for as long as it runs and fans every event out to its subscribers.
//! [`PushTransport`] is the seam to the network; [`WsTransport`] is the
//! WebSocket implementation.

mod client;
mod error;
mod feed;
mod subscribers;
mod transport;

pub use client::{
    ConnectionState, DEFAULT_RECONNECT_DELAY, EventStream, PushEventClient, PushSettings,
    push_url_for_api,
};
pub use error::PushError;
pub use feed::EventFeed;
pub use subscribers::{SubscriberId, Subscription};
pub use transport::{Frame, FrameStream, PushTransport, WsTransport};
