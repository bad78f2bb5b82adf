use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as held by the remote collection.
///
/// `id` and `created_at` are assigned remotely and never fabricated on this
/// side. The fields after `created_at` are display-only extras the server may
/// or may not send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default)]
    pub is_completed: bool,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            is_completed: false,
            created_at: created_at.into(),
            description: String::new(),
            priority: None,
            due_date: None,
            updated_at: None,
        }
    }

    /// Parsed priority; empty or unrecognised values mean "none".
    pub fn priority(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(|raw| raw.parse().ok())
    }

    pub fn created_date(&self) -> String {
        display_date(&self.created_at)
    }

    pub fn due_date_display(&self) -> String {
        self.due_date.as_deref().map(display_date).unwrap_or_default()
    }
}

/// Request body for `POST /todos`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
}

/// Request body for `PATCH /todos/{id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionPatch {
    pub is_completed: bool,
}

fn display_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}
