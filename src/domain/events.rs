//! Session events.
//!
//! Every session carries an append-only log of these. The log is the
//! audit trail used to build resume hints and to inspect what a run did.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stage::Stage;

/// Event type appended once a run has assembled its report
pub const PIPELINE_COMPLETE: &str = "pipeline_complete";

/// A single entry in a session's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Free-form event type (e.g. `detection_complete`)
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event was appended
    pub timestamp: DateTime<Utc>,

    /// Structured payload, shape depends on the event type
    #[serde(default)]
    pub payload: Value,
}

impl SessionEvent {
    /// Create a new event stamped with the current time
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Human-readable one-liner used as a resume hint
    pub fn describe(&self) -> String {
        format!(
            "Last event '{}' at {}",
            self.event_type,
            self.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Event type recorded when a stage finishes and its output is cached
pub fn stage_complete(stage: Stage) -> String {
    format!("{}_complete", stage)
}
