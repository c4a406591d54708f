use chrono::Utc;
use log::info;

use crate::database::{Database, DbResult};
use crate::models::project::{Project, ProjectStatus};

/// One-way projection of a project's assignee list onto daily task rows.
///
/// For every assignee there is at most one live task per project, titled
/// `[Project] {title}` and completed exactly when the project is done.
/// Tasks of users no longer assigned are deleted. Idempotent per
/// (project, assignee) pair.
pub fn sync_project_to_tasks(db: &Database, project: &Project) -> DbResult<()> {
    let synced_title = format!("[Project] {}", project.title);
    let completed = project.status == ProjectStatus::Done;
    let existing = db.get_tasks_by_project(&project.id)?;

    // Add missing, update changed
    for assignee in &project.assignees {
        match existing.iter().find(|t| &t.username == assignee) {
            Some(task) => {
                if task.title != synced_title {
                    db.update_task_title(&task.id, &synced_title)?;
                }
                if task.completed != completed {
                    db.update_task_status(&task.id, completed)?;
                }
            }
            None => {
                let date = project
                    .due_date
                    .clone()
                    .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
                let task =
                    db.add_task(assignee, &synced_title, &date, Some(project.id.clone()))?;
                if completed {
                    db.update_task_status(&task.id, true)?;
                }
                info!(
                    "Synced project {} to new task {} for {}",
                    project.id, task.id, assignee
                );
            }
        }
    }

    // Delete removed
    for task in &existing {
        if !project.assignees.contains(&task.username) {
            db.delete_task_by_project_and_user(&project.id, &task.username)?;
            info!(
                "Removed synced task of unassigned user {} from project {}",
                task.username, project.id
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use std::path::PathBuf;

    fn temp_db() -> (Database, PathBuf) {
        let dir = std::env::temp_dir().join(format!("logiport-sync-{}", uuid::Uuid::new_v4()));
        let db = Database::new(&dir).expect("create temp db");
        (db, dir)
    }

    fn project(id: &str, title: &str, status: ProjectStatus, assignees: &[&str]) -> Project {
        Project {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            category: None,
            status,
            assignees: assignees.iter().map(|s| s.to_string()).collect(),
            due_date: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            archived: false,
            archived_at: None,
        }
    }

    #[test]
    fn full_sync_lifecycle() {
        let (db, dir) = temp_db();

        // 1. Create: task appears for the assignee
        let mut p = project("sync1", "Sync Test Project", ProjectStatus::Todo, &["admin"]);
        db.save_project(&p).unwrap();
        sync_project_to_tasks(&db, &p).unwrap();

        let tasks = db.get_tasks_by_project("sync1").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "[Project] Sync Test Project");
        assert!(!tasks[0].completed);
        let task_id = tasks[0].id.clone();

        // 2. Status done: task completes
        p.status = ProjectStatus::Done;
        sync_project_to_tasks(&db, &p).unwrap();
        let tasks = db.get_tasks_by_project("sync1").unwrap();
        assert_eq!(tasks[0].id, task_id);
        assert!(tasks[0].completed);

        // 3. Rename: title follows
        p.title = "Renamed Project".to_string();
        sync_project_to_tasks(&db, &p).unwrap();
        let tasks = db.get_tasks_by_project("sync1").unwrap();
        assert_eq!(tasks[0].title, "[Project] Renamed Project");

        // 4. Unassign: task is deleted
        p.assignees.clear();
        sync_project_to_tasks(&db, &p).unwrap();
        assert!(db.get_tasks_by_project("sync1").unwrap().is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn sync_is_idempotent_per_assignee() {
        let (db, dir) = temp_db();
        let p = project("sync2", "Stable", ProjectStatus::InProgress, &["admin"]);
        sync_project_to_tasks(&db, &p).unwrap();
        sync_project_to_tasks(&db, &p).unwrap();
        assert_eq!(db.get_tasks_by_project("sync2").unwrap().len(), 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn new_assignee_joins_without_touching_others() {
        let (db, dir) = temp_db();
        let mut p = project("sync3", "Team", ProjectStatus::Todo, &["admin"]);
        sync_project_to_tasks(&db, &p).unwrap();

        p.assignees.push("operativa".to_string());
        sync_project_to_tasks(&db, &p).unwrap();

        let tasks = db.get_tasks_by_project("sync3").unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().any(|t| t.username == "admin"));
        assert!(tasks.iter().any(|t| t.username == "operativa"));
        std::fs::remove_dir_all(dir).ok();
    }
}
