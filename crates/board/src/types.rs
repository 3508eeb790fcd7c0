//! Wire types for the board's REST API.

use serde::{Deserialize, Serialize};

/// A task as the board reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardTask {
    pub id: String,
    pub title: String,
    /// Column the task currently sits in.
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "epicId", skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    #[serde(default, rename = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEpic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Responses for task lists come either as a bare array or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TaskListResponse {
    Bare(Vec<BoardTask>),
    Wrapped { tasks: Vec<BoardTask> },
}

impl TaskListResponse {
    pub(crate) fn into_tasks(self) -> Vec<BoardTask> {
        match self {
            Self::Bare(tasks) | Self::Wrapped { tasks } => tasks,
        }
    }
}
