use chrono::{DateTime, Utc};

/// One message delivered over the push channel.
///
/// The timestamp is kept exactly as the backend sent it; the backend clock
/// is not guaranteed to produce RFC 3339, so interpretation is opt-in via
/// [`PushEvent::parsed_timestamp`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PushEvent {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

impl PushEvent {
    pub fn new(
        timestamp: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            level: level.into(),
            message: message.into(),
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}
