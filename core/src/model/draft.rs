use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::model::task::{Status, Task, TaskPayload};
use crate::time::parse_human_date;

pub const TITLE_REQUIRED: &str = "Title is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Description,
    Status,
    DueDate,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::Description, Field::Status, Field::DueDate];

    pub fn next(self) -> Self {
        match self {
            Field::Title => Field::Description,
            Field::Description => Field::Status,
            Field::Status => Field::DueDate,
            Field::DueDate => Field::Title,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Field::Title => Field::DueDate,
            Field::Description => Field::Title,
            Field::Status => Field::Description,
            Field::DueDate => Field::Status,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Status => "Status",
            Field::DueDate => "Due Date",
        }
    }
}

/// Field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub(crate) fn clear(&mut self, field: Field) {
        self.0.remove(&field);
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.label(), msg))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Ephemeral editable copy of a task's fields. Lives only while a form is open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub due_date: String,
}

impl Draft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status,
            due_date: task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    /// Text value of a field; the status field yields its wire label.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Status => self.status.label(),
            Field::DueDate => &self.due_date,
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: String) -> anyhow::Result<()> {
        match field {
            Field::Title => self.title = value,
            Field::Description => self.description = value,
            Field::Status => self.status = value.parse()?,
            Field::DueDate => self.due_date = value,
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.title.trim().is_empty() {
            errors.insert(Field::Title, TITLE_REQUIRED);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the request body. An empty due date becomes an explicit
    /// absence; a recognised human date is rewritten as `YYYY-MM-DD`;
    /// anything else goes to the server untouched.
    pub fn normalize(&self, today: NaiveDate) -> TaskPayload {
        let raw_due = self.due_date.trim();
        let due_date = if raw_due.is_empty() {
            None
        } else {
            match parse_human_date(raw_due, today) {
                Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
                Err(_) => Some(raw_due.to_string()),
            }
        };

        TaskPayload {
            title: self.title.clone(),
            description: Some(self.description.clone()),
            status: self.status,
            due_date,
        }
    }
}
