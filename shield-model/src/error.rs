use std::fmt::{self, Display};

/// Errors produced by model constructors and parsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidComplianceTag(String),
    InvalidScanStatus(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidComplianceTag(raw) => write!(
                f,
                "invalid compliance tag '{raw}': expected '<standard>: <control>'"
            ),
            ModelError::InvalidScanStatus(raw) => {
                write!(f, "invalid scan status '{raw}'")
            }
        }
    }
}

impl std::error::Error for ModelError {}
