#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use shield_sync::api::{ApiError, ScanApi};
use shield_sync::model::{Finding, ScanJob, ScanStatus, Severity};
use shield_sync::push::{Frame, FrameStream, PushError, PushTransport};
use tokio::time::Instant;
use url::Url;

pub fn job(id: &str, status: ScanStatus) -> ScanJob {
    ScanJob::new(id, "example.com", status, Vec::new())
}

pub fn completed_with(id: &str, findings: Vec<Finding>) -> ScanJob {
    ScanJob::new(id, "example.com", ScanStatus::Completed, findings)
}

pub fn sqli() -> Finding {
    Finding::new(
        "SQLi",
        "User input reaches a SQL query unescaped",
        Severity::Critical,
    )
}

pub fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "backend unavailable".into(),
    }
}

struct Step {
    delay: Duration,
    outcome: Result<ScanJob, ApiError>,
}

/// `ScanApi` that replays a queue of status responses. Once the queue is
/// empty every fetch reports the job as running.
#[derive(Default)]
pub struct ScriptedScanApi {
    script: Mutex<VecDeque<Step>>,
    fetches: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedScanApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, outcome: Result<ScanJob, ApiError>) -> &Self {
        self.respond_after(Duration::ZERO, outcome)
    }

    pub fn respond_after(
        &self,
        delay: Duration,
        outcome: Result<ScanJob, ApiError>,
    ) -> &Self {
        self.script.lock().push_back(Step { delay, outcome });
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn requested_ids(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ScanApi for ScriptedScanApi {
    async fn create_scan(&self, _target: &str) -> Result<String, ApiError> {
        Ok("abc123".to_string())
    }

    async fn scan_status(&self, scan_id: &str) -> Result<ScanJob, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(scan_id.to_string());

        let step = self.script.lock().pop_front();
        let Some(Step { delay, outcome }) = step else {
            return Ok(job(scan_id, ScanStatus::Running));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn scan_history(&self) -> Result<Vec<ScanJob>, ApiError> {
        Ok(Vec::new())
    }
}

/// How one scripted connection behaves.
pub enum Connection {
    /// `open` fails.
    Refuse,
    /// Yield these frames, then stay open with nothing more to say.
    Hang(Vec<Result<Frame, PushError>>),
    /// Yield these frames, then end the stream.
    End(Vec<Result<Frame, PushError>>),
}

#[derive(Default)]
struct TransportState {
    script: Mutex<VecDeque<Connection>>,
    opens: Mutex<Vec<Instant>>,
}

/// `PushTransport` that replays scripted connections. Clones share the
/// script; once it is exhausted every connection stays open and silent.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<TransportState>,
}

impl ScriptedTransport {
    pub fn new(connections: impl IntoIterator<Item = Connection>) -> Self {
        let transport = Self::default();
        transport.state.script.lock().extend(connections);
        transport
    }

    pub fn opens(&self) -> Vec<Instant> {
        self.state.opens.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.lock().len()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&self, _url: &Url) -> Result<FrameStream, PushError> {
        self.state.opens.lock().push(Instant::now());

        let next = self.state.script.lock().pop_front();
        match next {
            Some(Connection::Refuse) => {
                Err(PushError::Transport("connection refused".into()))
            }
            Some(Connection::Hang(frames)) => {
                Ok(stream::iter(frames).chain(stream::pending()).boxed())
            }
            Some(Connection::End(frames)) => Ok(stream::iter(frames).boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}

pub fn text(payload: &str) -> Result<Frame, PushError> {
    Ok(Frame::Text(payload.to_string()))
}

pub fn socket_error() -> Result<Frame, PushError> {
    Err(PushError::Transport("connection reset by peer".into()))
}

pub fn push_url() -> Url {
    Url::parse("ws://localhost:8080/ws").expect("static url")
}
