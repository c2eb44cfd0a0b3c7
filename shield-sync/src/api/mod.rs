//! Backend scan API seam.
//!
//! The poller and the CLI only ever see [`ScanApi`]; [`HttpScanApi`] is the
//! production implementation.

mod error;
mod http;

pub use error::ApiError;
pub use http::HttpScanApi;

use async_trait::async_trait;
use shield_model::ScanJob;

/// Scan endpoints of the backend collaborator.
#[async_trait]
pub trait ScanApi: Send + Sync + 'static {
    /// Submit a scan of `target`; returns the backend-issued scan id.
    async fn create_scan(&self, target: &str) -> Result<String, ApiError>;

    /// Current snapshot of one scan.
    async fn scan_status(&self, scan_id: &str) -> Result<ScanJob, ApiError>;

    /// All scans known to the backend, newest first as the backend orders them.
    async fn scan_history(&self) -> Result<Vec<ScanJob>, ApiError>;
}
