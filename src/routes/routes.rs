use actix_web::web;

use super::login::login_handlers;

pub fn login_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-login")
            .route("", web::get().to(login_handlers::login_get))
            .route("/", web::get().to(login_handlers::login_get))
            .route("/login", web::post().to(login_handlers::login))
            .route("/auto-login", web::post().to(login_handlers::auto_login))
            .route("/logout", web::post().to(login_handlers::logout)),
    );
}

use super::profile::profile_handlers;

pub fn profile_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/profile")
            .route("", web::get().to(profile_handlers::get_profile))
            .route("/update-avatar", web::post().to(profile_handlers::update_avatar))
            .route("/update-settings", web::post().to(profile_handlers::update_settings)),
    );
}

use super::admin::admin_handlers;

pub fn admin_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .route("/users", web::get().to(admin_handlers::list_users))
            .route("/users/add", web::post().to(admin_handlers::add_user))
            .route("/users/update", web::post().to(admin_handlers::update_user))
            .route("/users/delete", web::post().to(admin_handlers::delete_user))
            .route(
                "/delete/all/the/sessions/BECAREFUL",
                web::get().to(admin_handlers::session_reset),
            ),
    );
}

use super::planner::planner_handlers;

pub fn planner_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/planner")
            .route("/tasks", web::get().to(planner_handlers::get_tasks))
            .route("/tasks/all", web::get().to(planner_handlers::get_all_tasks))
            .route("/tasks/add", web::post().to(planner_handlers::add_task))
            .route("/tasks/update", web::post().to(planner_handlers::update_task))
            .route("/tasks/delete", web::post().to(planner_handlers::delete_task))
            .route("/projects", web::get().to(planner_handlers::get_projects))
            .route("/projects/save", web::post().to(planner_handlers::save_project))
            .route("/projects/archive", web::post().to(planner_handlers::archive_project))
            .route("/projects/delete", web::post().to(planner_handlers::delete_project)),
    );
}

use super::customs::customs_handlers;

pub fn customs_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/extract-atr", web::post().to(customs_handlers::extract_atr));
    cfg.route("/api/extract-hs", web::post().to(customs_handlers::extract_hs));
}

use super::t2l::t2l_handlers;

pub fn t2l_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/vw")
            .route("/generate-t2l", web::post().to(t2l_handlers::generate_vw_t2l)),
    );
}

use super::toyota::toyota_handlers;

pub fn toyota_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/toyota")
            .route("/generate-t2l", web::post().to(t2l_handlers::generate_toyota_t2l))
            .route("/damage-report", web::post().to(toyota_handlers::damage_report))
            .route("/dvh-process", web::post().to(toyota_handlers::dvh_process))
            .route("/dvh-diz", web::post().to(toyota_handlers::dvh_diz))
            .route("/process-train", web::post().to(toyota_handlers::process_train)),
    );
}
