use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row in `daily_logs.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub username: String,
    /// Day the task belongs to, `YYYY-MM-DD`.
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
}
