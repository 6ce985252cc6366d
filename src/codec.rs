// Stored form of the task collection
//
// The collection is kept as a single JSON array under one storage key:
// [{"id": "...", "text": "...", "completed": false, "createdAt": "2024-05-01T10:00:00.000Z"}, ...]

use crate::task::Task;
use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Wire shape of one task, before validation
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StoredTask {
    id: String,
    text: String,
    completed: bool,
    created_at: String,
}

impl From<&Task> for StoredTask {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            text: task.text.clone(),
            completed: task.completed,
            created_at: task.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl StoredTask {
    fn into_task(self, index: usize) -> Result<Task> {
        if self.id.trim().is_empty() {
            return Err(eyre!("Record {}: id cannot be empty", index));
        }

        let text = self.text.trim();
        if text.is_empty() {
            return Err(eyre!("Record {} ({}): text cannot be empty", index, self.id));
        }

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .wrap_err_with(|| format!("Record {} ({}): invalid createdAt {:?}", index, self.id, self.created_at))?
            .with_timezone(&Utc);

        Ok(Task {
            text: text.to_string(),
            id: self.id,
            completed: self.completed,
            created_at,
        })
    }
}

/// Serialize the full collection
pub fn encode(tasks: &[Task]) -> Result<String> {
    let stored: Vec<StoredTask> = tasks.iter().map(StoredTask::from).collect();
    serde_json::to_string(&stored).context("Failed to serialize tasks")
}

/// Parse and validate a stored collection
///
/// The payload is accepted or rejected as a whole: one bad record (wrong
/// shape, blank text, unparseable timestamp, duplicate id) fails the decode.
pub fn decode(raw: &str) -> Result<Vec<Task>> {
    let stored: Vec<StoredTask> = serde_json::from_str(raw).context("Failed to parse stored tasks")?;

    let mut seen = HashSet::with_capacity(stored.len());
    let mut tasks = Vec::with_capacity(stored.len());

    for (index, record) in stored.into_iter().enumerate() {
        let task = record.into_task(index)?;
        if !seen.insert(task.id.clone()) {
            return Err(eyre!("Record {}: duplicate id {}", index, task.id));
        }
        tasks.push(task);
    }

    Ok(tasks)
}
