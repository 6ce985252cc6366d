// Task record for the todo collection

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

/// One to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique identifier, fixed at creation
    pub id: String,
    /// Trimmed, non-empty display text
    pub text: String,
    pub completed: bool,
    /// Creation instant, millisecond precision
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new, not yet completed task from raw user input
    ///
    /// Returns `None` when the text is empty or whitespace-only.
    pub fn new(raw_text: &str) -> Option<Self> {
        let text = raw_text.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            id: new_id(),
            text: text.to_string(),
            completed: false,
            created_at: now(),
        })
    }

    /// Copy of this task with `completed` flipped
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

/// Generate a fresh task id (UUIDv7, so ids sort by creation time)
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Current time truncated to milliseconds, the precision of the stored form
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
