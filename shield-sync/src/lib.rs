//! # Shield Sync
//!
//! Live status and event synchronization for the CyberShield security
//! dashboard. Everything a dashboard needs to stay current with a running
//! backend lives here; rendering does not.
//!
//! ## Overview
//!
//! Two independent components make up the layer:
//!
//! - **Scan lifecycle poller** ([`poller::ScanPoller`]): tracks one scan job by
//!   fetching its status on a fixed cadence until the backend reports a
//!   terminal status (`completed` or `failed`), publishing every snapshot.
//! - **Push event client** ([`push::PushEventClient`]): keeps one live
//!   connection to the backend's push channel, reconnecting after a fixed
//!   delay whenever it drops, and fans every event out to subscribers.
//!
//! Both talk to the backend through narrow seams so they can be driven by
//! fakes in tests: [`api::ScanApi`] for HTTP and [`push::PushTransport`] for
//! the push channel. Production implementations are [`api::HttpScanApi`]
//! (`reqwest`) and [`push::WsTransport`] (`tokio-tungstenite`).
//!
//! ## Failure model
//!
//! Nothing here gives up. A failed status fetch is reported as
//! [`poller::PollEvent::FetchFailed`] and the next tick still fires; a dropped
//! push connection is reopened after the configured delay, forever. Malformed
//! push frames are logged and dropped. All of it is logged through `tracing`.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shield_sync::api::{HttpScanApi, ScanApi};
//! use shield_sync::poller::{PollEvent, PollerSettings, ScanPoller};
//!
//! async fn track(target: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(HttpScanApi::new("http://localhost:8080")?);
//!     let scan_id = api.create_scan(target).await?;
//!
//!     let mut poller = ScanPoller::new(api, PollerSettings::default())?;
//!     let mut updates = poller.start(scan_id)?;
//!     while let Some(event) = updates.next().await {
//!         if let PollEvent::Snapshot { job, .. } = event {
//!             println!("{} is {}", job.id, job.status);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod poller;
pub mod push;

pub use api::{ApiError, HttpScanApi, ScanApi};
pub use poller::{PollEvent, PollUpdates, PollerError, PollerSettings, ScanPoller};
pub use push::{
    ConnectionState, EventFeed, EventStream, PushError, PushEventClient,
    PushSettings, PushTransport, SubscriberId, Subscription, WsTransport,
};
pub use shield_model as model;
