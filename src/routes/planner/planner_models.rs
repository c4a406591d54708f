use serde::{Deserialize, Serialize};

use crate::models::project::ProjectStatus;

#[derive(Deserialize)]
pub struct TasksQuery {
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct AddTaskRequest {
    pub title: String,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub id: String,
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Deserialize)]
pub struct DeleteTaskRequest {
    pub id: String,
}

/// Create-or-update payload; a missing id means a new project.
#[derive(Deserialize)]
pub struct SaveProjectRequest {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub assignees: Vec<String>,
    pub due_date: Option<String>,
}

#[derive(Deserialize)]
pub struct ProjectActionRequest {
    pub id: String,
}

#[derive(Serialize)]
pub struct PlannerActionResponse {
    pub success: bool,
    pub message: String,
}
