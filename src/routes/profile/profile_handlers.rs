use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};

use super::profile_models::{
    UpdateAvatarRequest, UpdateAvatarResponse, UpdateSettingsRequest, UpdateSettingsResponse,
};
use crate::database::Database;
use crate::models::user::UserSettingsPatch;
use crate::routes::login::login_models::UserView;
use crate::routes::{login_required, session_user};
use crate::sessions::SessionStore;

pub async fn get_profile(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };

    match db.get_user(&username) {
        Ok(Some(user)) => HttpResponse::Ok().json(UserView::from_user(&username, &user)),
        Ok(None) => HttpResponse::NotFound().finish(),
        Err(e) => {
            error!("Failed to read profile of {}: {}", username, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn update_avatar(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<UpdateAvatarRequest>,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };

    let patch = UserSettingsPatch {
        avatar: Some(body.avatar.clone()),
        ..Default::default()
    };
    match db.update_user_settings(&username, &patch) {
        Ok(true) => {
            info!("User {} updated avatar", username);
            HttpResponse::Ok().json(UpdateAvatarResponse {
                success: true,
                avatar: Some(body.avatar.clone()),
            })
        }
        Ok(false) => HttpResponse::BadRequest().json(UpdateAvatarResponse {
            success: false,
            avatar: None,
        }),
        Err(e) => {
            error!("Failed to update avatar of {}: {}", username, e);
            HttpResponse::InternalServerError().json(UpdateAvatarResponse {
                success: false,
                avatar: None,
            })
        }
    }
}

pub async fn update_settings(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<UpdateSettingsRequest>,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };

    let patch = UserSettingsPatch {
        name: body.name.clone(),
        visible_modules: body.visible_modules.clone(),
        dashboard_layout: body.dashboard_layout.clone(),
        ..Default::default()
    };
    match db.update_user_settings(&username, &patch) {
        Ok(true) => {
            info!("User {} updated settings", username);
            HttpResponse::Ok().json(UpdateSettingsResponse {
                success: true,
                message: "Settings updated".into(),
            })
        }
        Ok(false) => HttpResponse::BadRequest().json(UpdateSettingsResponse {
            success: false,
            message: "Unknown user".into(),
        }),
        Err(e) => {
            error!("Failed to update settings of {}: {}", username, e);
            HttpResponse::InternalServerError().json(UpdateSettingsResponse {
                success: false,
                message: "Failed to update settings".into(),
            })
        }
    }
}
