use serde::{Deserialize, Serialize};

/// One record in `users.json`. The username is the map key, not a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub password_hash: String,
    pub role: String,
    pub name: String,
    pub avatar: String,
    #[serde(default)]
    pub visible_modules: Vec<String>,
    #[serde(default)]
    pub dashboard_layout: Vec<String>,
}

/// Partial profile/admin update. Only present fields are applied.
#[derive(Debug, Default, Deserialize)]
pub struct UserSettingsPatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<String>,
    pub visible_modules: Option<Vec<String>>,
    pub dashboard_layout: Option<Vec<String>>,
}

impl User {
    pub fn apply_patch(&mut self, patch: &UserSettingsPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar = avatar.clone();
        }
        if let Some(role) = &patch.role {
            self.role = role.clone();
        }
        if let Some(modules) = &patch.visible_modules {
            self.visible_modules = modules.clone();
        }
        if let Some(layout) = &patch.dashboard_layout {
            self.dashboard_layout = layout.clone();
        }
    }
}
