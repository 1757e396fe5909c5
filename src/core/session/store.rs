//! In-memory session store.

use crate::core::pipeline::AnalysisResult;
use crate::error::SessionError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Opaque identifier of one analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, analysis not started
    Pending,
    /// Analysis in progress
    Running,
    /// Result available
    Completed,
    /// Analysis crashed; no result
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct SessionEntry {
    status: SessionStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    result: Option<Arc<AnalysisResult>>,
    error: Option<String>,
}

impl SessionEntry {
    fn snapshot(&self, id: SessionId) -> SessionSnapshot {
        SessionSnapshot {
            id,
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }
}

/// Session id → status and result.
///
/// Many readers may poll while one worker drives a session forward. Each
/// session moves Pending → Running → Completed | Failed, and the terminal
/// write happens once; a finished result is never replaced.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new pending session
    pub fn create(&self) -> Result<SessionId, SessionError> {
        let id = SessionId::new();
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        sessions.insert(
            id,
            SessionEntry {
                status: SessionStatus::Pending,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
                result: None,
                error: None,
            },
        );
        debug!(session = %id, "session created");
        Ok(id)
    }

    pub fn status(&self, id: SessionId) -> Result<SessionStatus, SessionError> {
        self.read(id, |entry| entry.status)
    }

    pub fn snapshot(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        self.read(id, |entry| entry.snapshot(id))
    }

    /// The finished result, if the session has completed
    pub fn result(&self, id: SessionId) -> Result<Option<Arc<AnalysisResult>>, SessionError> {
        self.read(id, |entry| entry.result.clone())
    }

    /// Forget a session; returns whether it existed
    pub fn remove(&self, id: SessionId) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        Ok(sessions.remove(&id).is_some())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop finished sessions older than `max_age`; returns how many
    pub fn prune_finished(&self, max_age: Duration) -> Result<usize, SessionError> {
        let cutoff = Utc::now() - max_age;
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        let before = sessions.len();
        sessions.retain(|_, entry| !(entry.status.is_terminal() && entry.created_at < cutoff));
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "pruned finished sessions");
        }
        Ok(pruned)
    }

    /// Pending → Running
    pub fn start(&self, id: SessionId) -> Result<(), SessionError> {
        self.transition(id, SessionStatus::Pending, SessionStatus::Running, |entry| {
            entry.started_at = Some(Utc::now());
        })
    }

    /// Running → Completed, storing the result
    pub fn complete(&self, id: SessionId, result: AnalysisResult) -> Result<(), SessionError> {
        self.transition(id, SessionStatus::Running, SessionStatus::Completed, |entry| {
            entry.finished_at = Some(Utc::now());
            entry.result = Some(Arc::new(result));
        })
    }

    /// Running → Failed, recording why
    pub fn fail(&self, id: SessionId, message: impl Into<String>) -> Result<(), SessionError> {
        let message = message.into();
        self.transition(id, SessionStatus::Running, SessionStatus::Failed, |entry| {
            entry.finished_at = Some(Utc::now());
            entry.error = Some(message);
        })
    }

    fn read<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&SessionEntry) -> T,
    ) -> Result<T, SessionError> {
        let sessions = self.sessions.read().map_err(|_| SessionError::Poisoned)?;
        sessions
            .get(&id)
            .map(f)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    fn transition(
        &self,
        id: SessionId,
        from: SessionStatus,
        to: SessionStatus,
        apply: impl FnOnce(&mut SessionEntry),
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;

        if entry.status != from {
            return Err(SessionError::InvalidTransition {
                id: id.to_string(),
                from: entry.status.as_str(),
                to: to.as_str(),
            });
        }

        entry.status = to;
        apply(entry);
        debug!(session = %id, status = %to, "session updated");
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
