use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::{error, info};
use uuid::Uuid;

use super::planner_models::{
    AddTaskRequest, DeleteTaskRequest, PlannerActionResponse, ProjectActionRequest,
    SaveProjectRequest, TasksQuery, UpdateTaskRequest,
};
use crate::database::Database;
use crate::models::project::Project;
use crate::routes::{admin_required, is_admin, login_required, session_user};
use crate::sessions::SessionStore;
use crate::sync::sync_project_to_tasks;

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn store_error(what: &str, e: impl std::fmt::Display) -> HttpResponse {
    error!("{}: {}", what, e);
    HttpResponse::InternalServerError().json(PlannerActionResponse {
        success: false,
        message: format!("{} failed", what),
    })
}

// --- Daily tasks ---

pub async fn get_tasks(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    query: web::Query<TasksQuery>,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };
    let date = query.date.clone().unwrap_or_else(today);
    match db.get_user_tasks(&username, &date) {
        Ok(tasks) => HttpResponse::Ok().json(tasks),
        Err(e) => store_error("Reading tasks", e),
    }
}

/// Tasks of every user for one date, for the admin overview.
pub async fn get_all_tasks(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    query: web::Query<TasksQuery>,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };
    if !is_admin(&db, &username) {
        return admin_required();
    }
    let date = query.date.clone().unwrap_or_else(today);
    match db.get_all_tasks_by_date(&date) {
        Ok(tasks) => HttpResponse::Ok().json(tasks),
        Err(e) => store_error("Reading tasks", e),
    }
}

pub async fn add_task(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<AddTaskRequest>,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };
    let date = body.date.clone().unwrap_or_else(today);
    match db.add_task(&username, &body.title, &date, None) {
        Ok(task) => {
            info!("User {} added task {} on {}", username, task.id, date);
            HttpResponse::Ok().json(task)
        }
        Err(e) => store_error("Adding task", e),
    }
}

pub async fn update_task(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<UpdateTaskRequest>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    let result = db.update_task(&body.id, |task| {
        if let Some(title) = &body.title {
            task.title = title.clone();
        }
        if let Some(completed) = body.completed {
            task.completed = completed;
        }
    });
    match result {
        Ok(true) => HttpResponse::Ok().json(PlannerActionResponse {
            success: true,
            message: "Task updated".into(),
        }),
        Ok(false) => HttpResponse::BadRequest().json(PlannerActionResponse {
            success: false,
            message: "Unknown task".into(),
        }),
        Err(e) => store_error("Updating task", e),
    }
}

pub async fn delete_task(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<DeleteTaskRequest>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    match db.delete_task(&body.id) {
        Ok(true) => HttpResponse::Ok().json(PlannerActionResponse {
            success: true,
            message: "Task deleted".into(),
        }),
        Ok(false) => HttpResponse::BadRequest().json(PlannerActionResponse {
            success: false,
            message: "Unknown task".into(),
        }),
        Err(e) => store_error("Deleting task", e),
    }
}

// --- Projects ---

pub async fn get_projects(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    match db.get_projects() {
        Ok(projects) => HttpResponse::Ok().json(projects),
        Err(e) => store_error("Reading projects", e),
    }
}

/// Saves a project and projects its assignee list onto daily tasks.
pub async fn save_project(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<SaveProjectRequest>,
) -> impl Responder {
    let username = match session_user(&req, &sessions) {
        Some(username) => username,
        None => return login_required(),
    };

    // Existing projects keep their provenance fields
    let existing = match &body.id {
        Some(id) => match db.get_project(id) {
            Ok(existing) => existing,
            Err(e) => return store_error("Reading project", e),
        },
        None => None,
    };

    let project = Project {
        id: body
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: body.title.clone(),
        description: body.description.clone(),
        category: body.category.clone(),
        status: body.status,
        assignees: body.assignees.clone(),
        due_date: body.due_date.clone(),
        created_by: existing
            .as_ref()
            .map(|p| p.created_by.clone())
            .unwrap_or_else(|| username.clone()),
        created_at: existing.as_ref().map(|p| p.created_at).unwrap_or_else(Utc::now),
        archived: existing.as_ref().map(|p| p.archived).unwrap_or(false),
        archived_at: existing.as_ref().and_then(|p| p.archived_at),
    };

    if let Err(e) = db.save_project(&project) {
        return store_error("Saving project", e);
    }
    if let Err(e) = sync_project_to_tasks(&db, &project) {
        return store_error("Syncing project tasks", e);
    }

    info!("User {} saved project {}", username, project.id);
    HttpResponse::Ok().json(project)
}

pub async fn archive_project(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<ProjectActionRequest>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    match db.archive_project(&body.id) {
        Ok(true) => HttpResponse::Ok().json(PlannerActionResponse {
            success: true,
            message: "Project archived".into(),
        }),
        Ok(false) => HttpResponse::BadRequest().json(PlannerActionResponse {
            success: false,
            message: "Unknown project".into(),
        }),
        Err(e) => store_error("Archiving project", e),
    }
}

/// Deleting a project leaves its synced tasks in place.
pub async fn delete_project(
    db: web::Data<Database>,
    sessions: web::Data<SessionStore>,
    req: HttpRequest,
    body: web::Json<ProjectActionRequest>,
) -> impl Responder {
    if session_user(&req, &sessions).is_none() {
        return login_required();
    }
    match db.delete_project(&body.id) {
        Ok(true) => HttpResponse::Ok().json(PlannerActionResponse {
            success: true,
            message: "Project deleted".into(),
        }),
        Ok(false) => HttpResponse::BadRequest().json(PlannerActionResponse {
            success: false,
            message: "Unknown project".into(),
        }),
        Err(e) => store_error("Deleting project", e),
    }
}
