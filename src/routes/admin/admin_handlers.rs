use actix_web::{web, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, DEFAULT_COST};
use log::{error, info, warn};

use super::admin_models::{
    AddUserRequest, AdminActionResponse, DeleteUserRequest, UpdateUserRequest,
};
use crate::database::Database;
use crate::models::user::{User, UserSettingsPatch};
use crate::routes::login::login_models::UserView;
use crate::routes::{admin_required, is_admin, login_required, session_user};
use crate::sessions::SessionStore;

/// Session user if logged in and admin, otherwise the error response.
fn admin_guard(
    req: &HttpRequest,
    db: &Database,
    sessions: &SessionStore,
) -> Result<String, HttpResponse> {
    let username = session_user(req, sessions).ok_or_else(login_required)?;
    if !is_admin(db, &username) {
        warn!("User {} tried to use the admin API", username);
        return Err(admin_required());
    }
    Ok(username)
}

pub async fn list_users(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
) -> impl Responder {
    if let Err(resp) = admin_guard(&req, &db, &sessions) {
        return resp;
    }
    match db.load_users() {
        Ok(users) => {
            let views: Vec<UserView> = users
                .iter()
                .map(|(username, user)| UserView::from_user(username, user))
                .collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => {
            error!("Failed to list users: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn add_user(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<AddUserRequest>,
) -> impl Responder {
    let admin = match admin_guard(&req, &db, &sessions) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };

    let password_hash = match hash(&body.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            error!("Failed to hash password: {}", e);
            return HttpResponse::InternalServerError().json(AdminActionResponse {
                success: false,
                message: "Failed to hash password".into(),
            });
        }
    };

    let user = User {
        password_hash,
        role: body.role.clone(),
        name: body.name.clone(),
        avatar: body.avatar.clone(),
        visible_modules: body.visible_modules.clone(),
        dashboard_layout: Vec::new(),
    };
    match db.add_user(&body.username, user) {
        Ok(true) => {
            info!("Admin {} added user {}", admin, body.username);
            HttpResponse::Ok().json(AdminActionResponse {
                success: true,
                message: "User added".into(),
            })
        }
        Ok(false) => HttpResponse::BadRequest().json(AdminActionResponse {
            success: false,
            message: "Username already taken".into(),
        }),
        Err(e) => {
            error!("Failed to add user {}: {}", body.username, e);
            HttpResponse::InternalServerError().json(AdminActionResponse {
                success: false,
                message: "Failed to add user".into(),
            })
        }
    }
}

pub async fn update_user(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let admin = match admin_guard(&req, &db, &sessions) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };

    let patch = UserSettingsPatch {
        name: body.name.clone(),
        avatar: body.avatar.clone(),
        role: body.role.clone(),
        visible_modules: body.visible_modules.clone(),
        dashboard_layout: body.dashboard_layout.clone(),
    };
    match db.update_user_settings(&body.username, &patch) {
        Ok(true) => {
            info!("Admin {} updated user {}", admin, body.username);
            HttpResponse::Ok().json(AdminActionResponse {
                success: true,
                message: "User updated".into(),
            })
        }
        Ok(false) => HttpResponse::BadRequest().json(AdminActionResponse {
            success: false,
            message: "Unknown user".into(),
        }),
        Err(e) => {
            error!("Failed to update user {}: {}", body.username, e);
            HttpResponse::InternalServerError().json(AdminActionResponse {
                success: false,
                message: "Failed to update user".into(),
            })
        }
    }
}

pub async fn delete_user(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<DeleteUserRequest>,
) -> impl Responder {
    let admin = match admin_guard(&req, &db, &sessions) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };
    if body.username == admin {
        return HttpResponse::BadRequest().json(AdminActionResponse {
            success: false,
            message: "Cannot delete own account".into(),
        });
    }

    match db.delete_user(&body.username) {
        Ok(true) => {
            info!("Admin {} deleted user {}", admin, body.username);
            HttpResponse::Ok().json(AdminActionResponse {
                success: true,
                message: "User deleted".into(),
            })
        }
        Ok(false) => HttpResponse::BadRequest().json(AdminActionResponse {
            success: false,
            message: "Unknown user".into(),
        }),
        Err(e) => {
            error!("Failed to delete user {}: {}", body.username, e);
            HttpResponse::InternalServerError().json(AdminActionResponse {
                success: false,
                message: "Failed to delete user".into(),
            })
        }
    }
}

pub async fn session_reset(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
) -> impl Responder {
    let admin = match admin_guard(&req, &db, &sessions) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };
    let dropped = sessions.clear();
    info!("Admin {} dropped {} sessions", admin, dropped);
    HttpResponse::Ok().json(AdminActionResponse {
        success: true,
        message: format!("Dropped {} sessions", dropped),
    })
}
