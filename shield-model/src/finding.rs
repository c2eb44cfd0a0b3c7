use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::compliance::ComplianceTag;

/// Severity of a single finding.
///
/// Ordering ranks `Critical` highest. `Info` and `Unknown` both sort below
/// `Low`; `Unknown` absorbs any label the backend sends that is not one of
/// the known values so a new label never breaks decoding of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Unknown,
}

impl Severity {
    /// Position in the dashboard's sort order, `0` being most severe.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
            Severity::Unknown => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
            Severity::Unknown => "Unknown",
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank().cmp(&self.rank())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let severity = match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" | "informational" => Severity::Info,
            _ => Severity::Unknown,
        };
        Ok(severity)
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Severity::Unknown)
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One security issue surfaced by a scan. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Finding {
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    pub severity: Severity,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub solution: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            skip_serializing_if = "Vec::is_empty",
            deserialize_with = "crate::compliance::deserialize_tags_lenient"
        )
    )]
    pub compliance: Vec<ComplianceTag>,
}

impl Finding {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            solution: None,
            compliance: Vec::new(),
        }
    }

    pub fn with_compliance(mut self, tags: Vec<ComplianceTag>) -> Self {
        self.compliance = tags;
        self
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }
}

/// Stable sort, most severe first. Findings of equal severity keep the order
/// the backend reported them in.
pub fn sort_by_severity(findings: &mut [Finding]) {
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// The `limit` most severe findings across `findings`.
pub fn top_findings<'a, I>(findings: I, limit: usize) -> Vec<Finding>
where
    I: IntoIterator<Item = &'a Finding>,
{
    let mut all: Vec<Finding> = findings.into_iter().cloned().collect();
    sort_by_severity(&mut all);
    all.truncate(limit);
    all
}
