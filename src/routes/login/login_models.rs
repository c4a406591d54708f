use serde::{Deserialize, Serialize};

use crate::models::user::User;

// Login request and response
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Public view of a user record, without the password hash.
#[derive(Serialize)]
pub struct UserView {
    pub username: String,
    pub role: String,
    pub name: String,
    pub avatar: String,
    pub visible_modules: Vec<String>,
    pub dashboard_layout: Vec<String>,
}

impl UserView {
    pub fn from_user(username: &str, user: &User) -> Self {
        UserView {
            username: username.to_string(),
            role: user.role.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            visible_modules: user.visible_modules.clone(),
            dashboard_layout: user.dashboard_layout.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

// Auto-login response
#[derive(Serialize)]
pub struct AutoLoginResponse {
    pub success: bool,
    pub message: String,
    pub username: String,
}

// Logout response
#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}
