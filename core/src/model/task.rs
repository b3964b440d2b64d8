use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Server-assigned task identity. Opaque to the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::InProgress, Status::Completed];

    /// Checkbox toggle. `completed` goes back to `pending`; any other status
    /// becomes `completed`, so an `in-progress` task does not survive a
    /// round trip.
    pub fn toggled(self) -> Self {
        match self {
            Status::Completed => Status::Pending,
            Status::Pending | Status::InProgress => Status::Completed,
        }
    }

    /// Three-state cycle: pending -> in-progress -> completed -> pending.
    pub fn advanced(self) -> Self {
        match self {
            Status::Pending => Status::InProgress,
            Status::InProgress => Status::Completed,
            Status::Completed => Status::Pending,
        }
    }

    /// Cycle in the opposite direction, used by the form's status picker.
    pub fn retreated(self) -> Self {
        match self {
            Status::Pending => Status::Completed,
            Status::InProgress => Status::Pending,
            Status::Completed => Status::InProgress,
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Status::Completed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "p" => Ok(Status::Pending),
            "in-progress" | "i" | "wip" => Ok(Status::InProgress),
            "completed" | "c" | "done" => Ok(Status::Completed),
            other => Err(anyhow!("Unknown status: '{}'", other)),
        }
    }
}

/// Cached copy of a server-owned task. Replaced wholesale on every fetch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(
        rename = "dueDate",
        default,
        deserialize_with = "deserialize_due_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            status: Status::default(),
            due_date: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// Body of a create or update request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    // Always sent; `null` is an explicit absence.
    #[serde(rename = "dueDate", default)]
    pub due_date: Option<String>,
}

impl From<&Task> for TaskPayload {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            due_date: task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Accepts `YYYY-MM-DD`, an RFC 3339 timestamp (the UTC date is kept) or null.
fn deserialize_due_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_wire_date))
}

pub(crate) fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc().date());
    }
    warn!(value = raw, "ignoring unparseable dueDate from server");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toggle_flips_between_completed_and_pending() {
        assert_eq!(Status::Completed.toggled(), Status::Pending);
        assert_eq!(Status::Pending.toggled(), Status::Completed);
        assert_eq!(Status::Pending.toggled().toggled(), Status::Pending);
    }

    #[test]
    fn toggle_loses_in_progress() {
        let once = Status::InProgress.toggled();
        assert_eq!(once, Status::Completed);
        assert_eq!(once.toggled(), Status::Pending);
    }

    #[test]
    fn advance_visits_every_status() {
        let mut status = Status::Pending;
        let mut seen = Vec::new();
        for _ in 0..3 {
            status = status.advanced();
            seen.push(status);
        }
        assert_eq!(seen, vec![Status::InProgress, Status::Completed, Status::Pending]);
        assert_eq!(Status::InProgress.advanced().retreated(), Status::InProgress);
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!(serde_json::from_value::<Status>(json!("archived")).is_err());
        assert!("archived".parse::<Status>().is_err());
        assert_eq!("wip".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!(
            serde_json::to_value(Status::InProgress).unwrap(),
            json!("in-progress")
        );
    }

    #[test]
    fn decodes_server_task() {
        let task: Task = serde_json::from_value(json!({
            "_id": "65a1",
            "title": "Buy milk",
            "status": "in-progress",
            "dueDate": "2024-03-05T00:00:00.000Z",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "__v": 0
        }))
        .unwrap();

        assert_eq!(task.id.as_str(), "65a1");
        assert_eq!(task.description, None);
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn decodes_plain_id_and_missing_fields() {
        let task: Task = serde_json::from_value(json!({
            "id": "7",
            "title": "Call mom",
            "dueDate": null
        }))
        .unwrap();

        assert_eq!(task.id, TaskId::new("7"));
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn garbage_due_date_is_treated_as_absent() {
        let task: Task = serde_json::from_value(json!({
            "_id": "1",
            "title": "x",
            "dueDate": "someday"
        }))
        .unwrap();
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn payload_always_carries_due_date() {
        let task = Task::new(TaskId::new("1"), "Buy milk");
        let body = serde_json::to_value(TaskPayload::from(&task)).unwrap();
        assert_eq!(
            body,
            json!({"title": "Buy milk", "status": "pending", "dueDate": null})
        );
    }
}
