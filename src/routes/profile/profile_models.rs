use serde::{Deserialize, Serialize};

// Avatar update request and response
#[derive(Deserialize)]
pub struct UpdateAvatarRequest {
    pub avatar: String,
}

#[derive(Serialize)]
pub struct UpdateAvatarResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Self-service settings update. Role changes go through the admin API.
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub name: Option<String>,
    pub visible_modules: Option<Vec<String>>,
    pub dashboard_layout: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct UpdateSettingsResponse {
    pub success: bool,
    pub message: String,
}
