use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::finding::Finding;

/// Lifecycle status of a scan job as reported by the backend.
///
/// `Completed` and `Failed` are terminal: once a job reports either, it
/// never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum ScanStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Queued => "queued",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

impl FromStr for ScanStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(ScanStatus::Queued),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(ModelError::InvalidScanStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for ScanStatus {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScanStatus> for String {
    fn from(value: ScanStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known snapshot of one submitted scan.
///
/// Snapshots are replaced wholesale on every fetch, never patched.
/// `findings` is only populated once the job is `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanJob {
    pub id: String,
    pub target: String,
    pub status: ScanStatus,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub progress: Option<u8>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub findings: Vec<Finding>,
}

impl ScanJob {
    pub fn new(
        id: impl Into<String>,
        target: impl Into<String>,
        status: ScanStatus,
        findings: Vec<Finding>,
    ) -> Self {
        let findings = if status == ScanStatus::Completed {
            findings
        } else {
            Vec::new()
        };
        Self {
            id: id.into(),
            target: target.into(),
            status,
            progress: None,
            findings,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// --- Wire types for the backend scan endpoints ---

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreateScanRequest {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreateScanResponse {
    pub scan_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanResults {
    #[cfg_attr(feature = "serde", serde(default))]
    pub vulnerabilities: Vec<Finding>,
}

/// Body of `GET /scans/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanStatusResponse {
    pub status: ScanStatus,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub progress: Option<u8>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub target: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub results: Option<ScanResults>,
}

impl ScanStatusResponse {
    /// Build the snapshot for `id`. The status endpoint does not echo the
    /// job id, so the caller supplies it.
    pub fn into_job(self, id: impl Into<String>) -> ScanJob {
        let findings = self
            .results
            .map(|results| results.vulnerabilities)
            .unwrap_or_default();
        let mut job = ScanJob::new(
            id,
            self.target.unwrap_or_default(),
            self.status,
            findings,
        );
        job.progress = self.progress.map(|p| p.min(100));
        job
    }
}

/// One entry of `GET /scans`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanRecord {
    pub scan_id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub target: String,
    pub status: ScanStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub vulnerabilities: Vec<Finding>,
}

impl From<ScanRecord> for ScanJob {
    fn from(record: ScanRecord) -> Self {
        ScanJob::new(
            record.scan_id,
            record.target,
            record.status,
            record.vulnerabilities,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanHistoryResponse {
    #[cfg_attr(feature = "serde", serde(default))]
    pub scans: Vec<ScanRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!ScanStatus::Queued.is_terminal());
        assert!(!ScanStatus::Running.is_terminal());
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
    }

    #[test]
    fn status_parse_rejects_unknown_values() {
        assert_eq!("RUNNING".parse::<ScanStatus>(), Ok(ScanStatus::Running));
        assert_eq!(
            "paused".parse::<ScanStatus>(),
            Err(ModelError::InvalidScanStatus("paused".into()))
        );
    }

    #[test]
    fn findings_are_dropped_until_completed() {
        let findings = vec![Finding::new("XSS", "", Severity::High)];
        let running =
            ScanJob::new("a", "example.com", ScanStatus::Running, findings.clone());
        assert!(running.findings.is_empty());

        let done =
            ScanJob::new("a", "example.com", ScanStatus::Completed, findings);
        assert_eq!(done.findings.len(), 1);
    }

    #[test]
    fn status_response_clamps_progress() {
        let response = ScanStatusResponse {
            status: ScanStatus::Running,
            progress: Some(140),
            target: Some("example.com".into()),
            results: None,
        };
        let job = response.into_job("abc123");
        assert_eq!(job.id, "abc123");
        assert_eq!(job.target, "example.com");
        assert_eq!(job.progress, Some(100));
    }
}
