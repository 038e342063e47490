//! Session records and user profiles.
//!
//! A session is one logical unit of analysis work: a profile that evolves
//! across calls, an append-only event log, and the last report produced.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::SessionEvent;

/// Length of generated session identifiers (hex chars)
pub const SESSION_ID_LEN: usize = 12;

/// Generate a fresh opaque session identifier
pub fn generate_session_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SESSION_ID_LEN);
    id
}

/// Free-form user profile (skill level, handedness, goals, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(BTreeMap<String, Value>);

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merge `other` into `self`, skipping blank values so that existing
    /// fields are never cleared by an empty update.
    pub fn merge_non_empty(&mut self, other: &UserProfile) {
        for (key, value) in &other.0 {
            if !is_blank(value) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }
}

impl FromIterator<(String, Value)> for UserProfile {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Null, empty string, false, zero, and empty containers count as blank.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// A persisted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque identifier; the store document keys records by it
    #[serde(skip)]
    pub session_id: String,

    #[serde(default)]
    pub user_profile: UserProfile,

    /// Append-only, insertion-ordered
    #[serde(default)]
    pub events: Vec<SessionEvent>,

    /// Last report produced for this session, replaced wholesale
    #[serde(default)]
    pub last_result: Option<Value>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create an empty record
    pub fn new(session_id: impl Into<String>, user_profile: UserProfile) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_profile,
            events: Vec::new(),
            last_result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an event and bump the update timestamp
    pub fn push_event(&mut self, event: SessionEvent) {
        self.events.push(event);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Most recent event of the given type
    pub fn last_event_of_type(&self, event_type: &str) -> Option<&SessionEvent> {
        self.events.iter().rev().find(|e| e.event_type == event_type)
    }

    /// Resume hint derived from the most recent event
    pub fn resume_hint(&self) -> Option<String> {
        self.events.last().map(SessionEvent::describe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids() {
        let a = generate_session_id();
        let b = generate_session_id();

        assert_eq!(a.len(), SESSION_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_merge_keeps_existing_fields() {
        let mut profile = UserProfile::new()
            .with("level", "Beginner")
            .with("hand", "right");

        let update = UserProfile::new()
            .with("level", "Advanced")
            .with("hand", "")
            .with("goal", Value::Null)
            .with("age", 0);
        profile.merge_non_empty(&update);

        assert_eq!(profile.get_str("level"), Some("Advanced"));
        assert_eq!(profile.get_str("hand"), Some("right"));
        assert!(profile.get("goal").is_none());
        assert!(profile.get("age").is_none());
    }

    #[test]
    fn test_blank_values() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!(false)));
        assert!(is_blank(&json!(0)));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!("x")));
        assert!(!is_blank(&json!(3)));
        assert!(!is_blank(&json!(true)));
    }

    #[test]
    fn test_resume_hint_uses_last_event() {
        let mut record = SessionRecord::new("abc", UserProfile::new());
        assert!(record.resume_hint().is_none());

        record.push_event(SessionEvent::new("detection_complete", json!({})));
        record.push_event(SessionEvent::new("evaluation_complete", json!({})));

        let hint = record.resume_hint().unwrap();
        assert!(hint.contains("'evaluation_complete'"));
        assert_eq!(
            record.last_event_of_type("detection_complete").unwrap().event_type,
            "detection_complete"
        );
    }
}
