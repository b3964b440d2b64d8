use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::model::task::{Task, TaskId};

/// How the list catches up with the server after a successful mutation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileStrategy {
    /// Discard the collection and fetch it again.
    #[default]
    #[serde(rename = "full")]
    FullReload,
    /// Apply the server's reply to the cached collection by id.
    #[serde(rename = "patch")]
    PatchById,
}

impl FromStr for ReconcileStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" | "reload" => Ok(ReconcileStrategy::FullReload),
            "patch" => Ok(ReconcileStrategy::PatchById),
            other => Err(anyhow!("Unknown reconcile strategy: '{}' (expected full or patch)", other)),
        }
    }
}

impl fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStrategy::FullReload => f.write_str("full"),
            ReconcileStrategy::PatchById => f.write_str("patch"),
        }
    }
}

/// Replaces the task with the same id, or appends it if it is new.
pub fn apply_saved(tasks: &mut Vec<Task>, saved: Task) {
    match tasks.iter().position(|t| t.id == saved.id) {
        Some(pos) => tasks[pos] = saved,
        None => tasks.push(saved),
    }
}

pub fn apply_removed(tasks: &mut Vec<Task>, id: &TaskId) {
    tasks.retain(|t| t.id != *id);
}
