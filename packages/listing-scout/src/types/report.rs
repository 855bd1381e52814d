//! Comparison reports and the session outcome handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::listing::ListingRecord;
use super::session::BackendKind;

/// Free-form comparison text produced once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub session_id: Uuid,
    pub subject_a: String,
    pub subject_b: String,
    pub backend: BackendKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ComparisonReport {
    pub fn new(
        session_id: Uuid,
        subject_a: impl Into<String>,
        subject_b: impl Into<String>,
        backend: BackendKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            subject_a: subject_a.into(),
            subject_b: subject_b.into(),
            backend,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether this report compares the given pair, in either order.
    pub fn covers(&self, a: &str, b: &str) -> bool {
        let same = |x: &str, y: &str| x.eq_ignore_ascii_case(y);
        (same(&self.subject_a, a) && same(&self.subject_b, b))
            || (same(&self.subject_a, b) && same(&self.subject_b, a))
    }
}

/// Why the controller moved away from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTransition {
    pub from: BackendKind,
    pub reason: String,
}

/// What a completed session returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub session_id: Uuid,
    pub backend: BackendKind,
    pub report: String,
    pub subject_a_records: Vec<ListingRecord>,
    pub subject_b_records: Vec<ListingRecord>,

    /// Backends abandoned before `backend` succeeded, in order.
    pub transitions: Vec<BackendTransition>,
}

impl AnalysisOutcome {
    pub fn total_records(&self) -> usize {
        self.subject_a_records.len() + self.subject_b_records.len()
    }
}
