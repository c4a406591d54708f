use actix_web::{web, HttpRequest, HttpResponse, Responder};
use bcrypt::verify;
use log::{error, info};

use super::login_models::{AutoLoginResponse, LoginRequest, LoginResponse, LogoutResponse, UserView};
use crate::database::Database;
use crate::sessions::SessionStore;

pub async fn login_get() -> impl Responder {
    info!("Received request on /api-login endpoint");
    HttpResponse::Ok().body("Hello, this is the Logiport login endpoint.")
}

// login logic
pub async fn login(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: web::Json<LoginRequest>,
) -> impl Responder {
    let username = &req.username;
    info!("Received login request for user: {}", username);

    let user = match db.get_user(username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid username: {}", username);
            return HttpResponse::Unauthorized().json(LoginResponse {
                success: false,
                message: "Invalid username".into(),
                user: None,
            });
        }
        Err(e) => {
            error!("Failed to read users for login: {}", e);
            return HttpResponse::InternalServerError().json(LoginResponse {
                success: false,
                message: "Failed to read user store".into(),
                user: None,
            });
        }
    };

    let valid = match verify(&req.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(_) => {
            error!("Error when checking password for user: {}", username);
            return HttpResponse::Unauthorized().json(LoginResponse {
                success: false,
                message: "Error when checking password".into(),
                user: None,
            });
        }
    };

    if !valid {
        info!("Invalid password for user: {}", username);
        return HttpResponse::Unauthorized().json(LoginResponse {
            success: false,
            message: "Invalid password".into(),
            user: None,
        });
    }

    let session = sessions.create(username, req.remember_me);

    info!("User {} logged in successfully", username);
    HttpResponse::Ok()
        .cookie(
            actix_web::cookie::Cookie::build("session_id", session.session_id.clone())
                .http_only(true)
                .finish(),
        )
        .json(LoginResponse {
            success: true,
            message: "Login successful".into(),
            user: Some(UserView::from_user(username, &user)),
        })
}

// auto_login logic
pub async fn auto_login(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
) -> impl Responder {
    let session_id = match req.cookie("session_id") {
        Some(cookie) => cookie.value().to_string(),
        None => {
            info!("Session ID not found in cookies for auto login");
            return HttpResponse::BadRequest().json(AutoLoginResponse {
                success: false,
                message: "Session ID not found in cookies".into(),
                username: "".into(),
            });
        }
    };

    info!("Received auto login request with session ID: {}", session_id);

    let username = match sessions.validate(&session_id) {
        Some(username) => username,
        None => {
            info!("Session invalid or expired for session ID: {}", session_id);
            return HttpResponse::Unauthorized().json(AutoLoginResponse {
                success: false,
                message: "Login is needed, session expired".into(),
                username: "".into(),
            });
        }
    };

    match db.get_user(&username) {
        Ok(Some(_)) => {
            info!("Auto login successful for user: {}", username);
            HttpResponse::Ok()
                .cookie(
                    actix_web::cookie::Cookie::build("session_id", session_id.clone())
                        .http_only(true)
                        .finish(),
                )
                .json(AutoLoginResponse {
                    success: true,
                    message: format!("Welcome back, {}", username),
                    username,
                })
        }
        Ok(None) => {
            // Session for a user deleted in the meantime
            sessions.remove(&session_id);
            info!("User {} behind session no longer exists", username);
            HttpResponse::Unauthorized().json(AutoLoginResponse {
                success: false,
                message: "User no longer exists".into(),
                username: "".into(),
            })
        }
        Err(e) => {
            error!("Failed to fetch user for session ID {}: {}", session_id, e);
            HttpResponse::InternalServerError().json(AutoLoginResponse {
                success: false,
                message: "Failed to fetch user information".into(),
                username: "".into(),
            })
        }
    }
}

pub async fn logout(sessions: web::Data<SessionStore>, req: HttpRequest) -> impl Responder {
    let session_id = match req.cookie("session_id") {
        Some(cookie) => cookie.value().to_string(),
        None => {
            info!("Session ID does not exist in cookies for logout");
            return HttpResponse::BadRequest().json(LogoutResponse {
                success: false,
                message: "Session ID does not exist".into(),
            });
        }
    };

    info!("Received logout request with session ID: {}", session_id);

    if sessions.remove(&session_id) {
        info!("Logout successful for session ID: {}", session_id);
        HttpResponse::Ok().json(LogoutResponse {
            success: true,
            message: "Logout successful".into(),
        })
    } else {
        info!("Session not found for session ID: {}", session_id);
        HttpResponse::BadRequest().json(LogoutResponse {
            success: false,
            message: "Session not found".into(),
        })
    }
}
