//! Analysis sessions and their state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, ScoutError};

/// Which analysis backend a session runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Remote model, first choice (OpenAI).
    PrimaryRemote,
    /// Remote model, second choice (Gemini).
    SecondaryRemote,
    /// Offline, deterministic. Never fails.
    LocalDeterministic,
}

impl BackendKind {
    /// Default priority order.
    pub const DEFAULT_PRIORITY: [BackendKind; 3] = [
        BackendKind::PrimaryRemote,
        BackendKind::SecondaryRemote,
        BackendKind::LocalDeterministic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryRemote => "openai",
            Self::SecondaryRemote => "gemini",
            Self::LocalDeterministic => "local",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::LocalDeterministic)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "primary" | "primary_remote" => Ok(Self::PrimaryRemote),
            "gemini" | "secondary" | "secondary_remote" => Ok(Self::SecondaryRemote),
            "local" | "mock" | "deterministic" | "local_deterministic" => {
                Ok(Self::LocalDeterministic)
            }
            other => Err(ScoutError::Config(format!("unknown backend: {other}"))),
        }
    }
}

/// Lifecycle of a session attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    BackendSelected,
    ComparisonDone,
    ListingsDiscovered,
    DetailsExtracted,
    Completed,
    Failed,
}

impl SessionState {
    /// The only state reachable by a normal advance from `self`.
    fn successor(&self) -> Option<SessionState> {
        match self {
            Self::Created => Some(Self::BackendSelected),
            Self::BackendSelected => Some(Self::ComparisonDone),
            Self::ComparisonDone => Some(Self::ListingsDiscovered),
            Self::ListingsDiscovered => Some(Self::DetailsExtracted),
            Self::DetailsExtracted => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::BackendSelected => "backend_selected",
            Self::ComparisonDone => "comparison_done",
            Self::ListingsDiscovered => "listings_discovered",
            Self::DetailsExtracted => "details_extracted",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One end-to-end request.
///
/// The id and subjects never change. A fallback restart keeps the id and
/// starts a fresh attempt via [`AnalysisSession::restart`], which is the only
/// way to bind a different backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: Uuid,
    pub subject_a: String,
    pub subject_b: String,
    pub created_at: DateTime<Utc>,
    pub attempt: u32,
    chosen_backend: Option<BackendKind>,
    state: SessionState,
}

impl AnalysisSession {
    pub fn new(subject_a: impl Into<String>, subject_b: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_a: subject_a.into(),
            subject_b: subject_b.into(),
            created_at: Utc::now(),
            attempt: 1,
            chosen_backend: None,
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chosen_backend(&self) -> Option<BackendKind> {
        self.chosen_backend
    }

    pub fn subjects(&self) -> [&str; 2] {
        [&self.subject_a, &self.subject_b]
    }

    /// Bind the backend for this attempt. Succeeds exactly once.
    pub fn bind_backend(&mut self, kind: BackendKind) -> Result<()> {
        if self.chosen_backend.is_some() {
            return Err(self.illegal(SessionState::BackendSelected));
        }
        self.advance_to(SessionState::BackendSelected)?;
        self.chosen_backend = Some(kind);
        Ok(())
    }

    /// Move to the next pipeline state. Skipping states is rejected.
    pub fn advance_to(&mut self, next: SessionState) -> Result<()> {
        if self.state.successor() != Some(next) {
            return Err(self.illegal(next));
        }
        self.state = next;
        Ok(())
    }

    /// Terminal failure. Only the deterministic backend can put us here.
    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    /// Start the next attempt against a different backend.
    pub fn restart(&self) -> Self {
        Self {
            id: self.id,
            subject_a: self.subject_a.clone(),
            subject_b: self.subject_b.clone(),
            created_at: self.created_at,
            attempt: self.attempt + 1,
            chosen_backend: None,
            state: SessionState::Created,
        }
    }

    fn illegal(&self, to: SessionState) -> ScoutError {
        ScoutError::State {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}
