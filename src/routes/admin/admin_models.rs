use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct AddUserRequest {
    pub username: String,
    pub password: String,
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub visible_modules: Vec<String>,
}

/// Admin-side partial update; unlike the profile API this may change the
/// role.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<String>,
    pub visible_modules: Option<Vec<String>>,
    pub dashboard_layout: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct DeleteUserRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct AdminActionResponse {
    pub success: bool,
    pub message: String,
}
