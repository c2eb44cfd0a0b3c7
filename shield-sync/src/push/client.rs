use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use shield_config::PushConfig;
use shield_model::PushEvent;
use shield_model::api_routes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::subscribers::{SubscriberSet, Subscription};
use super::transport::{Frame, FrameStream};
use super::{PushError, PushTransport, SubscriberId, WsTransport};

/// Wait between a lost connection and the next attempt when nothing else is
/// configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3_000);

/// Where the client's single connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, either idle or waiting to reconnect.
    Disconnected,
    /// An open attempt is in progress.
    Connecting,
    /// Frames are being received.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Timing of a [`PushEventClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushSettings {
    /// Fixed wait after every close or failed open.
    pub reconnect_delay: Duration,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl From<&PushConfig> for PushSettings {
    fn from(config: &PushConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// Events delivered to an [`PushEventClient::event_stream`] consumer.
///
/// Holds its own subscription; dropping the stream unsubscribes.
#[derive(Debug)]
pub struct EventStream {
    inner: UnboundedReceiverStream<PushEvent>,
    subscription: Subscription,
}

impl EventStream {
    /// Subscriber id backing this stream.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscription.id()
    }
}

impl futures::Stream for EventStream {
    type Item = PushEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct Inner<T: ?Sized> {
    url: Url,
    settings: PushSettings,
    subscribers: Arc<SubscriberSet>,
    state: watch::Sender<ConnectionState>,
    reconnects: AtomicU64,
    connections: AtomicU64,
    dropped_frames: AtomicU64,
    delivered: AtomicU64,
    transport: T,
}

impl<T: ?Sized> Inner<T> {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(url = %self.url, from = %previous, to = %next, "push connection state changed");
        }
    }
}

struct Lifecycle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the connection loop. Dropping the last client handle cancels it.
#[derive(Default)]
struct LifecycleSlot(Mutex<Option<Lifecycle>>);

impl Drop for LifecycleSlot {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.0.get_mut().take() {
            lifecycle.cancel.cancel();
        }
    }
}

/// Long-lived client for the backend push channel.
///
/// One client holds at most one connection. Whenever that connection closes
/// or fails, the client waits `reconnect_delay` and opens a new one, until
/// [`PushEventClient::close`] is called or every handle is dropped. Each
/// well-formed event is handed to every current subscriber, in registration
/// order; malformed frames are logged and dropped.
///
/// Clones share the same connection and subscribers.
pub struct PushEventClient<T: PushTransport + ?Sized = WsTransport> {
    inner: Arc<Inner<T>>,
    lifecycle: Arc<LifecycleSlot>,
}

impl<T: PushTransport + ?Sized> Clone for PushEventClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<T: PushTransport + ?Sized> fmt::Debug for PushEventClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushEventClient")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

impl PushEventClient<WsTransport> {
    /// WebSocket client for `url` (`ws://` or `wss://`).
    pub fn websocket(url: &str, settings: PushSettings) -> Result<Self, PushError> {
        let url = parse_push_url(url)?;
        Ok(Self::new(url, WsTransport, settings))
    }

    /// WebSocket client built from the `push` config section.
    pub fn from_config(config: &PushConfig) -> Result<Self, PushError> {
        Self::websocket(&config.url, PushSettings::from(config))
    }
}

fn parse_push_url(raw: &str) -> Result<Url, PushError> {
    let url = Url::parse(raw).map_err(|source| PushError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(PushError::UnsupportedScheme(other.to_string())),
    }
}

/// Push channel URL served by the same backend as `api_base`: `http`
/// becomes `ws`, `https` becomes `wss`, and the path is the push route.
pub fn push_url_for_api(api_base: &str) -> Result<Url, PushError> {
    let mut url = Url::parse(api_base).map_err(|source| PushError::InvalidUrl {
        url: api_base.to_string(),
        source,
    })?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(PushError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|()| PushError::UnsupportedScheme(scheme.to_string()))?;
    url.set_path(api_routes::WS);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

impl<T: PushTransport> PushEventClient<T> {
    /// Idle client; call [`PushEventClient::connect`] to start it.
    pub fn new(url: Url, transport: T, settings: PushSettings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url,
                settings,
                subscribers: Arc::new(SubscriberSet::default()),
                state,
                reconnects: AtomicU64::new(0),
                connections: AtomicU64::new(0),
                dropped_frames: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                transport,
            }),
            lifecycle: Arc::new(LifecycleSlot::default()),
        }
    }
}

impl<T: PushTransport + ?Sized> PushEventClient<T> {
    /// Start the connection loop on the current tokio runtime.
    ///
    /// Returns `false` without doing anything if the loop is already
    /// running, or if there is no runtime to run it on.
    pub fn connect(&self) -> bool {
        let mut slot = self.lifecycle.0.lock();
        if slot.as_ref().is_some_and(|l| !l.task.is_finished()) {
            warn!(url = %self.inner.url, "push client already connected, ignoring connect");
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(url = %self.inner.url, "no tokio runtime, push client not started");
            return false;
        };

        info!(url = %self.inner.url, "starting push client");
        let cancel = CancellationToken::new();
        let task = handle.spawn(run_connection_loop(Arc::clone(&self.inner), cancel.clone()));
        *slot = Some(Lifecycle { cancel, task });
        true
    }

    /// Stop the connection loop and wait for it to exit.
    ///
    /// Subscribers stay registered; a later [`connect`](Self::connect)
    /// resumes delivery to them.
    pub async fn close(&self) {
        let lifecycle = self.lifecycle.0.lock().take();
        if let Some(Lifecycle { cancel, task }) = lifecycle {
            info!(url = %self.inner.url, "closing push client");
            cancel.cancel();
            if let Err(err) = task.await
                && err.is_panic()
            {
                warn!(url = %self.inner.url, "push connection loop panicked");
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Register `handler` for every event received from now on.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.insert(Arc::new(handler));
        debug!(subscriber = %id, "push subscriber added");
        Subscription::new(id, &self.inner.subscribers)
    }

    /// Remove a handler by id, e.g. from inside the handler itself.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.remove(id);
        if removed {
            debug!(subscriber = %id, "push subscriber removed");
        }
        removed
    }

    /// Subscribe through a stream instead of a callback.
    pub fn event_stream(&self) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            let _ = sender.send(event.clone());
        });
        EventStream {
            inner: UnboundedReceiverStream::new(receiver),
            subscription,
        }
    }

    /// Handlers currently registered, event streams included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Reconnects scheduled since the client was created.
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnects.load(Ordering::Acquire)
    }

    /// Connections that reached `Connected`.
    pub fn connections(&self) -> u64 {
        self.inner.connections.load(Ordering::Acquire)
    }

    /// Frames that could not be parsed as an event.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped_frames.load(Ordering::Acquire)
    }

    /// Events handed to subscribers.
    pub fn delivered_events(&self) -> u64 {
        self.inner.delivered.load(Ordering::Acquire)
    }

    /// Whether the connection loop is alive.
    pub fn is_running(&self) -> bool {
        self.lifecycle
            .0
            .lock()
            .as_ref()
            .is_some_and(|l| !l.task.is_finished())
    }

    /// Push channel endpoint.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> PushSettings {
        self.inner.settings
    }
}

async fn run_connection_loop<T: PushTransport + ?Sized>(
    inner: Arc<Inner<T>>,
    cancel: CancellationToken,
) {
    let delay = inner.settings.reconnect_delay;

    loop {
        inner.set_state(ConnectionState::Connecting);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = inner.transport.open(&inner.url) => opened,
        };

        match opened {
            Ok(frames) => {
                inner.connections.fetch_add(1, Ordering::AcqRel);
                inner.set_state(ConnectionState::Connected);
                info!(url = %inner.url, "push channel connected");

                if !pump_frames(&inner, frames, &cancel).await {
                    break;
                }
            }
            Err(err) => {
                warn!(url = %inner.url, error = %err, "failed to open push channel");
            }
        }

        inner.set_state(ConnectionState::Disconnected);
        let attempt = inner.reconnects.fetch_add(1, Ordering::AcqRel) + 1;
        info!(
            url = %inner.url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "push channel closed, reconnecting"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    inner.set_state(ConnectionState::Disconnected);
    debug!(url = %inner.url, "push connection loop exited");
}

/// Deliver frames until the connection ends. Returns `false` if cancelled.
async fn pump_frames<T: PushTransport + ?Sized>(
    inner: &Inner<T>,
    mut frames: FrameStream,
    cancel: &CancellationToken,
) -> bool {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(Frame::Text(text))) => deliver(inner, text.as_bytes()),
            Some(Ok(Frame::Binary(bytes))) => deliver(inner, &bytes),
            Some(Ok(Frame::Close)) => {
                info!(url = %inner.url, "push channel closed by peer");
                return true;
            }
            Some(Err(err)) => {
                warn!(url = %inner.url, error = %err, "push channel error, forcing close");
                return true;
            }
            None => {
                info!(url = %inner.url, "push channel stream ended");
                return true;
            }
        }
    }
}

fn deliver<T: ?Sized>(inner: &Inner<T>, payload: &[u8]) {
    match serde_json::from_slice::<PushEvent>(payload) {
        Ok(event) => {
            let handled = inner.subscribers.dispatch(&event);
            inner.delivered.fetch_add(1, Ordering::AcqRel);
            debug!(level = %event.level, subscribers = handled, "push event delivered");
        }
        Err(err) => {
            inner.dropped_frames.fetch_add(1, Ordering::AcqRel);
            warn!(
                error = %err,
                payload = %String::from_utf8_lossy(payload),
                "dropping malformed push frame"
            );
        }
    }
}
