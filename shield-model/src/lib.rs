//! Core data model definitions shared across the CyberShield sync crates.
//!
//! Everything here is plain data: scan snapshots as reported by the backend,
//! the findings they carry, push events from the live log channel, and the
//! compliance catalogue used to join findings to controls. No I/O happens in
//! this crate.
#![allow(missing_docs)]

pub mod api_routes;
pub mod compliance;
pub mod error;
pub mod events;
pub mod finding;
pub mod scan;

// Intentionally curated re-exports for downstream consumers.
pub use compliance::{
    ComplianceReport, ComplianceStandard, ComplianceTag, Control,
    ControlReport, ControlStatus, StandardReport,
};
pub use error::ModelError;
pub use events::PushEvent;
pub use finding::{Finding, Severity, sort_by_severity, top_findings};
pub use scan::{
    CreateScanRequest, CreateScanResponse, ScanHistoryResponse, ScanJob,
    ScanRecord, ScanResults, ScanStatus, ScanStatusResponse,
};
