//! Compliance tags and the control mapping used by the compliance view.
//!
//! Findings carry tags of the form `"<StandardName>: <ControlId>"`. A report
//! is built by joining those tags against a catalogue of standards by exact
//! string match on both halves: a control fails as soon as one finding
//! references it.

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::finding::Finding;

const TAG_SEPARATOR: &str = ": ";

/// A `<standard>: <control>` reference attached to a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ComplianceTag {
    standard: String,
    control: String,
}

impl ComplianceTag {
    pub fn new(standard: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            standard: standard.into(),
            control: control.into(),
        }
    }

    pub fn standard(&self) -> &str {
        &self.standard
    }

    pub fn control(&self) -> &str {
        &self.control
    }
}

impl FromStr for ComplianceTag {
    type Err = ModelError;

    /// Splits on the first `": "`; everything after it is the control id.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.split_once(TAG_SEPARATOR) {
            Some((standard, control))
                if !standard.is_empty() && !control.is_empty() =>
            {
                Ok(Self::new(standard, control))
            }
            _ => Err(ModelError::InvalidComplianceTag(raw.to_string())),
        }
    }
}

impl TryFrom<String> for ComplianceTag {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComplianceTag> for String {
    fn from(value: ComplianceTag) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ComplianceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.standard, TAG_SEPARATOR, self.control)
    }
}

/// Decode a list of tags, skipping malformed entries instead of rejecting
/// the whole finding.
#[cfg(feature = "serde")]
pub(crate) fn deserialize_tags_lenient<'de, D>(
    deserializer: D,
) -> Result<Vec<ComplianceTag>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(|tag| tag.parse().ok())
        .collect())
}

/// A control definition inside a standard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub id: &'static str,
    pub description: &'static str,
}

/// A compliance standard and the controls it is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceStandard {
    pub name: &'static str,
    pub description: &'static str,
    pub controls: Vec<Control>,
}

impl ComplianceStandard {
    /// Standards monitored by the dashboard out of the box.
    pub fn builtin() -> Vec<ComplianceStandard> {
        vec![
            ComplianceStandard {
                name: "ISO 27001",
                description: "Information Security Management",
                controls: vec![
                    Control {
                        id: "A.12.6.1",
                        description: "Management of technical vulnerabilities",
                    },
                    Control {
                        id: "A.14.1.2",
                        description: "Securing application services on public networks",
                    },
                    Control {
                        id: "A.14.1.3",
                        description: "Protecting application services transactions",
                    },
                    Control {
                        id: "A.14.2.6",
                        description: "Secure development environment",
                    },
                    Control {
                        id: "A.9.2.1",
                        description: "User registration and de-registration",
                    },
                ],
            },
            ComplianceStandard {
                name: "GDPR",
                description: "General Data Protection Regulation",
                controls: vec![Control {
                    id: "Art. 32",
                    description: "Security of processing",
                }],
            },
            ComplianceStandard {
                name: "NIST CSF",
                description: "Cybersecurity Framework",
                controls: vec![
                    Control {
                        id: "PR.IP-1",
                        description: "Data is protected at rest",
                    },
                    Control {
                        id: "ID.SC-1",
                        description: "Cyber supply chain risk management processes are identified",
                    },
                    Control {
                        id: "DE.CM-8",
                        description: "Vulnerability scans are performed",
                    },
                ],
            },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Pass,
    Fail,
}

/// Evaluation of one control against a set of findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReport {
    pub id: &'static str,
    pub description: &'static str,
    pub status: ControlStatus,
    pub issues: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardReport {
    pub name: &'static str,
    pub description: &'static str,
    pub controls: Vec<ControlReport>,
}

impl StandardReport {
    pub fn is_compliant(&self) -> bool {
        self.controls
            .iter()
            .all(|control| control.status == ControlStatus::Pass)
    }

    pub fn failing_controls(&self) -> impl Iterator<Item = &ControlReport> {
        self.controls
            .iter()
            .filter(|control| control.status == ControlStatus::Fail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceReport {
    pub standards: Vec<StandardReport>,
}

impl ComplianceReport {
    /// Join `findings` to `catalogue` by compliance tag. Tags naming an
    /// unknown standard or control are ignored.
    pub fn evaluate(
        catalogue: &[ComplianceStandard],
        findings: &[Finding],
    ) -> Self {
        let mut standards: Vec<StandardReport> = catalogue
            .iter()
            .map(|standard| StandardReport {
                name: standard.name,
                description: standard.description,
                controls: standard
                    .controls
                    .iter()
                    .map(|control| ControlReport {
                        id: control.id,
                        description: control.description,
                        status: ControlStatus::Pass,
                        issues: Vec::new(),
                    })
                    .collect(),
            })
            .collect();

        for finding in findings {
            for tag in &finding.compliance {
                let Some(standard) = standards
                    .iter_mut()
                    .find(|standard| standard.name == tag.standard())
                else {
                    continue;
                };
                if let Some(control) = standard
                    .controls
                    .iter_mut()
                    .find(|control| control.id == tag.control())
                {
                    control.status = ControlStatus::Fail;
                    control.issues.push(finding.clone());
                }
            }
        }

        Self { standards }
    }

    pub fn standard(&self, name: &str) -> Option<&StandardReport> {
        self.standards.iter().find(|standard| standard.name == name)
    }

    pub fn is_fully_compliant(&self) -> bool {
        self.standards.iter().all(StandardReport::is_compliant)
    }
}
