use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

use crate::database::Database;
use crate::sessions::SessionStore;

pub mod routes;

pub mod admin;
pub mod customs;
pub mod login;
pub mod planner;
pub mod profile;
pub mod t2l;
pub mod toyota;

/// Username behind the request's session cookie, if the session is live.
pub fn session_user(req: &HttpRequest, sessions: &SessionStore) -> Option<String> {
    req.cookie("session_id")
        .and_then(|cookie| sessions.validate(cookie.value()))
}

pub fn login_required() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "success": false,
        "message": "Login required"
    }))
}

pub fn admin_required() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({
        "success": false,
        "message": "Admin role required"
    }))
}

pub fn is_admin(db: &Database, username: &str) -> bool {
    matches!(db.get_user(username), Ok(Some(user)) if user.role == "admin")
}
