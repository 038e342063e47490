//! Durable session store backed by a single JSON document.
//!
//! The whole store is loaded once at open and rewritten in full after every
//! mutation (temp file + rename). That is O(sessions) per write, which is fine
//! while the session count stays small.
//!
//! Writers inside one process are serialized by the store's mutex. Nothing
//! guards against a second process writing the same document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{generate_session_id, SessionEvent, SessionRecord, UserProfile};

/// Extension given to a store document that failed to load
pub const CORRUPT_EXTENSION: &str = "corrupt";

/// File-backed store of session records
pub struct SessionStore {
    /// Path to the store document
    path: PathBuf,

    sessions: Mutex<BTreeMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Open the store at `path`, loading any existing document.
    ///
    /// A document that cannot be read or parsed is moved aside to
    /// `<path>.corrupt` and the store starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = load_document(&path).await;

        Ok(Self {
            path,
            sessions: Mutex::new(sessions),
        })
    }

    /// Path to the store document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path that receives a corrupt document
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension(CORRUPT_EXTENSION)
    }

    /// Return the session for `session_id`, or create a new one.
    ///
    /// For a known id, non-empty fields of `profile` are merged into the
    /// stored profile. An unknown or missing id always yields a fresh record
    /// under a newly generated identifier.
    pub async fn ensure_session(
        &self,
        session_id: Option<&str>,
        profile: Option<UserProfile>,
    ) -> Result<SessionRecord> {
        let mut sessions = self.sessions.lock().await;

        // Known session: merge the profile, or return it untouched
        if let Some(id) = session_id.filter(|id| sessions.contains_key(*id)) {
            let mut record = sessions[id].clone();
            match profile {
                Some(profile) if !profile.is_empty() => {
                    record.user_profile.merge_non_empty(&profile);
                    record.touch();
                }
                _ => return Ok(record),
            }
            self.commit(&mut sessions, |next| {
                next.insert(id.to_string(), record.clone());
            })
            .await?;
            return Ok(record);
        }

        // Unknown or missing id: mint a fresh one
        let mut new_id = generate_session_id();
        while sessions.contains_key(&new_id) {
            new_id = generate_session_id();
        }

        let record = SessionRecord::new(new_id.clone(), profile.unwrap_or_default());
        self.commit(&mut sessions, |next| {
            next.insert(new_id.clone(), record.clone());
        })
        .await?;

        debug!(session_id = %new_id, "Created session");
        Ok(record)
    }

    /// Look up a session
    pub async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// All sessions, most recently updated first
    pub async fn list(&self) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> =
            self.sessions.lock().await.values().cloned().collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records
    }

    /// Append an event to a session's log, creating the session if needed
    pub async fn append_event(
        &self,
        session_id: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        self.commit(&mut sessions, |next| {
            next.entry(session_id.to_string())
                .or_insert_with(|| SessionRecord::new(session_id, UserProfile::new()))
                .push_event(SessionEvent::new(event_type, payload));
        })
        .await
    }

    /// Replace a session's last result, creating the session if needed
    pub async fn set_last_result(&self, session_id: &str, result: Value) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        self.commit(&mut sessions, |next| {
            let record = next
                .entry(session_id.to_string())
                .or_insert_with(|| SessionRecord::new(session_id, UserProfile::new()));
            record.last_result = Some(result);
            record.touch();
        })
        .await
    }

    /// Human-readable description of the session's most recent event
    pub async fn resume_hint(&self, session_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .and_then(SessionRecord::resume_hint)
    }

    /// Apply `change` to a copy of the sessions and swap it in only once the
    /// copy is on disk, so a failed write leaves memory matching the file.
    async fn commit<R>(
        &self,
        sessions: &mut BTreeMap<String, SessionRecord>,
        change: impl FnOnce(&mut BTreeMap<String, SessionRecord>) -> R,
    ) -> Result<R> {
        let mut next = sessions.clone();
        let output = change(&mut next);
        self.persist(&next).await?;
        *sessions = next;
        Ok(output)
    }

    /// Rewrite the whole document
    async fn persist(&self, sessions: &BTreeMap<String, SessionRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }

        let content =
            serde_json::to_string_pretty(sessions).context("Failed to serialize sessions")?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .with_context(|| format!("Failed to write session store: {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace session store: {}", self.path.display()))?;

        Ok(())
    }
}

/// Read the store document, quarantining it if it does not parse
async fn load_document(path: &Path) -> BTreeMap<String, SessionRecord> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let parsed = match fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str::<BTreeMap<String, SessionRecord>>(&content)
            .map_err(anyhow::Error::from),
        Err(e) => Err(e.into()),
    };

    match parsed {
        Ok(mut sessions) => {
            for (id, record) in sessions.iter_mut() {
                record.session_id = id.clone();
            }
            debug!(count = sessions.len(), path = %path.display(), "Loaded sessions");
            sessions
        }
        Err(e) => {
            let backup = path.with_extension(CORRUPT_EXTENSION);
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "Session store unreadable, starting empty"
            );
            if let Err(rename_err) = fs::rename(path, &backup).await {
                warn!(error = %rename_err, "Failed to move corrupt session store aside");
            }
            BTreeMap::new()
        }
    }
}
