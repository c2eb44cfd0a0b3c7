//! Scan lifecycle poller.
//!
//! A [`ScanPoller`] tracks one scan job at a time. Starting a session fetches
//! the job immediately and then once per interval until the backend reports a
//! terminal status or the session is stopped. Every fetch runs on its own
//! task, so a slow response never delays the next tick; responses carry a
//! sequence number and anything older than the last applied snapshot is
//! dropped.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use parking_lot::Mutex;
use shield_config::PollerConfig;
use shield_model::ScanJob;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ScanApi};

/// Cadence used when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Timing of a [`ScanPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Time between the starts of two consecutive fetches.
    pub interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&PollerConfig> for PollerSettings {
    fn from(config: &PollerConfig) -> Self {
        Self {
            interval: config.interval(),
        }
    }
}

/// Reasons a poller cannot be built or started.
#[derive(Debug, Error)]
pub enum PollerError {
    /// `start` was given a blank job id.
    #[error("job id must not be empty")]
    EmptyJobId,

    /// [`PollerSettings::interval`] is zero.
    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    /// `start` was called outside a tokio runtime.
    #[error("polling requires a running tokio runtime")]
    NoRuntime,
}

/// One outcome of a status fetch, tagged with the fetch's sequence number.
#[derive(Debug)]
pub enum PollEvent {
    /// A snapshot newer than anything applied before it.
    Snapshot {
        /// Sequence number of the fetch, starting at 1.
        seq: u64,
        /// The job as the backend reported it.
        job: ScanJob,
    },
    /// The fetch failed; polling carries on with the next tick.
    FetchFailed {
        /// Sequence number of the fetch, starting at 1.
        seq: u64,
        /// Why the fetch failed.
        error: ApiError,
    },
}

impl PollEvent {
    /// Sequence number of the fetch that produced this event.
    pub fn seq(&self) -> u64 {
        match self {
            PollEvent::Snapshot { seq, .. } | PollEvent::FetchFailed { seq, .. } => *seq,
        }
    }
}

/// Stream of [`PollEvent`]s for one session. Ends once the session stops.
#[derive(Debug)]
pub struct PollUpdates {
    receiver: mpsc::UnboundedReceiver<PollEvent>,
}

impl PollUpdates {
    /// Next event, or `None` once the session has stopped.
    pub async fn next(&mut self) -> Option<PollEvent> {
        self.receiver.recv().await
    }
}

impl Stream for PollUpdates {
    type Item = PollEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Shared state of one tracking session.
struct Session {
    job_id: String,
    cancel: CancellationToken,
    stopped: AtomicBool,
    issued: AtomicU64,
    /// Held while applying so results and `stop` are serialized.
    applied: Mutex<Applied>,
    latest: Arc<watch::Sender<Option<ScanJob>>>,
    updates: Mutex<Option<mpsc::UnboundedSender<PollEvent>>>,
}

#[derive(Debug, Default)]
struct Applied {
    /// Sequence number of the last applied snapshot.
    seq: u64,
    /// Scan target, from `start_with_target` or the first snapshot that
    /// names one. The status endpoint may omit it.
    target: Option<String>,
}

impl Applied {
    fn fill_target(&mut self, job: &mut ScanJob) {
        match &self.target {
            Some(target) if job.target.is_empty() => job.target = target.clone(),
            Some(_) => {}
            None if !job.target.is_empty() => self.target = Some(job.target.clone()),
            None => {}
        }
    }
}

impl Session {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn apply(&self, seq: u64, outcome: Result<ScanJob, ApiError>) {
        let mut applied = self.applied.lock();
        if self.is_stopped() {
            debug!(job_id = %self.job_id, seq, "discarding fetch result after stop");
            return;
        }

        match outcome {
            Ok(mut job) => {
                if seq <= applied.seq {
                    debug!(
                        job_id = %self.job_id,
                        seq,
                        applied = applied.seq,
                        "discarding stale snapshot"
                    );
                    return;
                }
                applied.seq = seq;
                applied.fill_target(&mut job);

                let terminal = job.is_terminal();
                let status = job.status;
                self.latest.send_replace(Some(job.clone()));
                self.emit(PollEvent::Snapshot { seq, job });

                if terminal {
                    info!(job_id = %self.job_id, seq, %status, "scan reached terminal status, polling stopped");
                    self.halt_locked();
                }
            }
            Err(error) => {
                warn!(job_id = %self.job_id, seq, error = %error, "scan status fetch failed");
                self.emit(PollEvent::FetchFailed { seq, error });
            }
        }
    }

    fn emit(&self, event: PollEvent) {
        if let Some(sender) = self.updates.lock().as_ref() {
            // Receiver may be gone; the watch channel still carries state.
            let _ = sender.send(event);
        }
    }

    fn stop(&self) {
        let _applied = self.applied.lock();
        self.halt_locked();
    }

    /// Caller must hold `applied`.
    fn halt_locked(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        self.updates.lock().take();
    }
}

/// Tracks a scan job until it reaches a terminal status.
///
/// Only one session runs at a time; [`ScanPoller::start`] stops the previous
/// one. Dropping the poller stops the current session.
pub struct ScanPoller<A: ScanApi + ?Sized = dyn ScanApi> {
    api: Arc<A>,
    settings: PollerSettings,
    latest: Arc<watch::Sender<Option<ScanJob>>>,
    session: Option<Arc<Session>>,
}

impl<A: ScanApi + ?Sized> fmt::Debug for ScanPoller<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanPoller")
            .field("settings", &self.settings)
            .field("job_id", &self.job_id())
            .field("running", &self.is_running())
            .finish()
    }
}

impl<A: ScanApi + ?Sized> ScanPoller<A> {
    /// Idle poller; nothing is fetched until [`ScanPoller::start`].
    pub fn new(api: Arc<A>, settings: PollerSettings) -> Result<Self, PollerError> {
        if settings.interval.is_zero() {
            return Err(PollerError::ZeroInterval);
        }
        let (latest, _) = watch::channel(None);
        Ok(Self {
            api,
            settings,
            latest: Arc::new(latest),
            session: None,
        })
    }

    /// Begin tracking `job_id`: fetch now, then every interval.
    ///
    /// Any session already running is stopped first and the latest snapshot
    /// is cleared.
    pub fn start(&mut self, job_id: impl Into<String>) -> Result<PollUpdates, PollerError> {
        self.begin(job_id.into(), None)
    }

    /// Like [`ScanPoller::start`], for a job whose target the caller already
    /// knows. Snapshots that come back without a target get this one.
    pub fn start_with_target(
        &mut self,
        job_id: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<PollUpdates, PollerError> {
        let target = target.into();
        let target = (!target.trim().is_empty()).then_some(target);
        self.begin(job_id.into(), target)
    }

    fn begin(
        &mut self,
        job_id: String,
        target: Option<String>,
    ) -> Result<PollUpdates, PollerError> {
        if job_id.trim().is_empty() {
            return Err(PollerError::EmptyJobId);
        }
        let handle = Handle::try_current().map_err(|_| PollerError::NoRuntime)?;

        self.stop();
        self.latest.send_replace(None);

        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Arc::new(Session {
            job_id,
            cancel: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            issued: AtomicU64::new(0),
            applied: Mutex::new(Applied {
                seq: 0,
                target,
            }),
            latest: Arc::clone(&self.latest),
            updates: Mutex::new(Some(sender)),
        });

        info!(
            job_id = %session.job_id,
            interval_ms = self.settings.interval.as_millis() as u64,
            "starting scan poller"
        );

        handle.spawn(run_ticker(
            Arc::clone(&self.api),
            Arc::clone(&session),
            self.settings.interval,
            handle.clone(),
        ));
        self.session = Some(session);

        Ok(PollUpdates { receiver })
    }

    /// Cancel the timer. Fetches already in flight finish but are ignored.
    /// Safe to call at any time, any number of times.
    pub fn stop(&self) {
        if let Some(session) = &self.session
            && !session.is_stopped()
        {
            debug!(job_id = %session.job_id, "stopping scan poller");
            session.stop();
        }
    }

    /// Whether a session is active and has not stopped.
    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_stopped())
    }

    /// Job id of the current or last session.
    pub fn job_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.job_id.as_str())
    }

    /// Most recently applied snapshot of the current session.
    pub fn latest(&self) -> Option<ScanJob> {
        self.latest.borrow().clone()
    }

    /// Receiver that observes every applied snapshot, across sessions.
    pub fn watch(&self) -> watch::Receiver<Option<ScanJob>> {
        self.latest.subscribe()
    }

    /// Number of fetches the current session has issued.
    pub fn fetches_issued(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |s| s.issued.load(Ordering::Acquire))
    }

    /// Settings the poller was built with.
    pub fn settings(&self) -> PollerSettings {
        self.settings
    }
}

impl<A: ScanApi + ?Sized> Drop for ScanPoller<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticker<A: ScanApi + ?Sized>(
    api: Arc<A>,
    session: Arc<Session>,
    period: Duration,
    handle: Handle,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break,
            _ = ticker.tick() => {
                let seq = session.next_seq();
                debug!(job_id = %session.job_id, seq, "fetching scan status");
                handle.spawn(fetch(Arc::clone(&api), Arc::clone(&session), seq));
            }
        }
    }

    debug!(job_id = %session.job_id, "scan poller ticker exited");
}

async fn fetch<A: ScanApi + ?Sized>(api: Arc<A>, session: Arc<Session>, seq: u64) {
    if session.is_stopped() {
        return;
    }
    let outcome = api.scan_status(&session.job_id).await;
    session.apply(seq, outcome);
}
