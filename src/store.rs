// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Durable session storage
//!
//! One JSON file per session id under the store directory. Writes go through
//! a temp file and an atomic rename, so a crash mid-write never leaves a
//! truncated session on disk. A mutex serializes read-modify-write cycles so
//! multiple orchestrator instances can share one store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{QuillError, Result, StoreError};
use crate::message::Message;

/// A persisted chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session id; also the file stem on disk
    #[serde(skip)]
    pub id: Uuid,

    /// Last persisted-at time
    pub timestamp: DateTime<Utc>,

    /// Ordered message log
    pub messages: Vec<Message>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            messages: Vec::new(),
        }
    }
}

/// Summary row for session pickers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message_count: usize,
}

/// Durable mapping from session id to ordered message log
pub struct SessionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_session(path: &Path, id: Uuid) -> std::result::Result<Session, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(id));
        }
        let content = std::fs::read_to_string(path).map_err(StoreError::Io)?;
        let mut session: Session = serde_json::from_str(&content).map_err(StoreError::Json)?;
        session.id = id;
        Ok(session)
    }

    /// Write the session to a temp file in the store directory, then rename
    /// it over the target. Rename within one directory is atomic, so readers
    /// only ever observe the old or the new complete file.
    fn persist(&self, session: &Session) -> std::result::Result<(), StoreError> {
        use std::io::Write;

        let content = serde_json::to_string_pretty(session).map_err(StoreError::Json)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(StoreError::Io)?;
        tmp.write_all(content.as_bytes()).map_err(StoreError::Io)?;
        tmp.persist(self.session_path(session.id))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Load a session by id
    pub fn load(&self, id: Uuid) -> Result<Session> {
        Ok(Self::read_session(&self.session_path(id), id)?)
    }

    /// Summaries of all stored sessions, newest first
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };

            match Self::read_session(&path, id) {
                Ok(session) => summaries.push(SessionSummary {
                    id,
                    timestamp: session.timestamp,
                    message_count: session.messages.len(),
                }),
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "skipping unreadable session file");
                }
            }
        }

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }

    /// Append a message, creating the session on first use. Returns the
    /// updated session after a durable persist.
    pub fn append(&self, id: Uuid, message: Message) -> Result<Session> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut session = match Self::read_session(&self.session_path(id), id) {
            Ok(session) => session,
            Err(StoreError::NotFound(_)) => Session::new(id),
            Err(e) => return Err(e.into()),
        };

        session.messages.push(message);
        session.timestamp = Utc::now();
        self.persist(&session).map_err(QuillError::Store)?;
        Ok(session)
    }

    /// Remove the most recently appended message iff it equals `message`.
    /// A mismatch leaves the log unchanged and signals a consistency fault.
    pub fn rollback(&self, id: Uuid, message: &Message) -> Result<Session> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut session = Self::read_session(&self.session_path(id), id)?;

        if session.messages.last() != Some(message) {
            return Err(StoreError::RollbackMismatch.into());
        }

        session.messages.pop();
        session.timestamp = Utc::now();
        self.persist(&session).map_err(QuillError::Store)?;
        tracing::debug!(session = %id, "rolled back last message");
        Ok(session)
    }

    /// Delete a session file. Collaborator-facing; the orchestrator never
    /// deletes.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let path = self.session_path(id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }
}
