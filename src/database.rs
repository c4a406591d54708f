use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use log::error;

use crate::models::project::Project;
use crate::models::task::Task;
use crate::models::user::{User, UserSettingsPatch};

const USERS_FILE: &str = "users.json";
const TASKS_FILE: &str = "daily_logs.json";
const PROJECTS_FILE: &str = "projects.json";

#[derive(Debug)]
pub enum DbError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Io(e) => write!(f, "io error: {}", e),
            DbError::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        DbError::Io(e)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Json(e)
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Flat-file JSON store for users, daily tasks and projects.
///
/// Every mutation is a full-file read-modify-rewrite holding `write_lock`
/// from the read to the rewrite, and files are swapped in with a rename,
/// so concurrent writers cannot drop each other's changes and readers
/// never observe a partially written file.
pub struct Database {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> DbResult<Self> {
        let db = Database {
            data_dir: data_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        db.ensure_files()?;
        Ok(db)
    }

    fn ensure_files(&self) -> DbResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        if !self.data_dir.join(USERS_FILE).exists() {
            self.save_users(&default_users())?;
        }
        if !self.data_dir.join(TASKS_FILE).exists() {
            self.save_tasks(&[])?;
        }
        if !self.data_dir.join(PROJECTS_FILE).exists() {
            self.save_projects(&[])?;
        }
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> DbResult<T> {
        let raw = fs::read_to_string(self.data_dir.join(file))?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_json<T: serde::Serialize>(&self, file: &str, value: &T) -> DbResult<()> {
        let raw = serde_json::to_string_pretty(value)?;
        let tmp = self.data_dir.join(format!("{}.tmp", file));
        fs::write(&tmp, raw)?;
        fs::rename(tmp, self.data_dir.join(file))?;
        Ok(())
    }

    // --- Users ---

    pub fn load_users(&self) -> DbResult<BTreeMap<String, User>> {
        self.read_json(USERS_FILE)
    }

    fn save_users(&self, users: &BTreeMap<String, User>) -> DbResult<()> {
        self.write_json(USERS_FILE, users)
    }

    pub fn get_user(&self, username: &str) -> DbResult<Option<User>> {
        Ok(self.load_users()?.remove(username))
    }

    /// Partial update of a user profile. Returns false if the user is unknown.
    pub fn update_user_settings(
        &self,
        username: &str,
        patch: &UserSettingsPatch,
    ) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut users = self.load_users()?;
        match users.get_mut(username) {
            Some(user) => {
                user.apply_patch(patch);
                self.save_users(&users)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns false when the username is already taken.
    pub fn add_user(&self, username: &str, user: User) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut users = self.load_users()?;
        if users.contains_key(username) {
            return Ok(false);
        }
        users.insert(username.to_string(), user);
        self.save_users(&users)?;
        Ok(true)
    }

    pub fn delete_user(&self, username: &str) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut users = self.load_users()?;
        if users.remove(username).is_none() {
            return Ok(false);
        }
        self.save_users(&users)?;
        Ok(true)
    }

    // --- Daily tasks ---

    fn load_tasks(&self) -> DbResult<Vec<Task>> {
        self.read_json(TASKS_FILE)
    }

    fn save_tasks(&self, tasks: &[Task]) -> DbResult<()> {
        self.write_json(TASKS_FILE, &tasks)
    }

    pub fn get_user_tasks(&self, username: &str, date: &str) -> DbResult<Vec<Task>> {
        Ok(self
            .load_tasks()?
            .into_iter()
            .filter(|t| t.username == username && t.date == date)
            .collect())
    }

    pub fn add_task(
        &self,
        username: &str,
        title: &str,
        date: &str,
        project_id: Option<String>,
    ) -> DbResult<Task> {
        let _guard = self.write_lock.lock().unwrap();
        let now = Utc::now();
        let task = Task {
            id: now.timestamp_micros().to_string(),
            username: username.to_string(),
            date: date.to_string(),
            title: title.to_string(),
            project_id,
            completed: false,
            timestamp: now,
        };
        let mut tasks = self.load_tasks()?;
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;
        Ok(task)
    }

    pub fn update_task_status(&self, task_id: &str, completed: bool) -> DbResult<bool> {
        self.update_task(task_id, |t| t.completed = completed)
    }

    pub fn update_task_title(&self, task_id: &str, title: &str) -> DbResult<bool> {
        self.update_task(task_id, |t| t.title = title.to_string())
    }

    pub fn update_task<F: FnOnce(&mut Task)>(&self, task_id: &str, apply: F) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut tasks = self.load_tasks()?;
        match tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                apply(task);
                self.save_tasks(&tasks)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete_task(&self, task_id: &str) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut tasks = self.load_tasks()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.save_tasks(&tasks)?;
        Ok(true)
    }

    pub fn get_all_tasks_by_date(&self, date: &str) -> DbResult<Vec<Task>> {
        Ok(self
            .load_tasks()?
            .into_iter()
            .filter(|t| t.date == date)
            .collect())
    }

    pub fn get_tasks_by_project(&self, project_id: &str) -> DbResult<Vec<Task>> {
        Ok(self
            .load_tasks()?
            .into_iter()
            .filter(|t| t.project_id.as_deref() == Some(project_id))
            .collect())
    }

    pub fn delete_task_by_project_and_user(
        &self,
        project_id: &str,
        username: &str,
    ) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut tasks = self.load_tasks()?;
        let before = tasks.len();
        tasks.retain(|t| {
            !(t.project_id.as_deref() == Some(project_id) && t.username == username)
        });
        if tasks.len() == before {
            return Ok(false);
        }
        self.save_tasks(&tasks)?;
        Ok(true)
    }

    // --- Projects ---

    fn load_projects(&self) -> DbResult<Vec<Project>> {
        self.read_json(PROJECTS_FILE)
    }

    fn save_projects(&self, projects: &[Project]) -> DbResult<()> {
        self.write_json(PROJECTS_FILE, &projects)
    }

    pub fn get_projects(&self) -> DbResult<Vec<Project>> {
        self.load_projects()
    }

    pub fn get_project(&self, project_id: &str) -> DbResult<Option<Project>> {
        Ok(self
            .load_projects()?
            .into_iter()
            .find(|p| p.id == project_id))
    }

    /// Insert or replace a project by id.
    pub fn save_project(&self, project: &Project) -> DbResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut projects = self.load_projects()?;
        match projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project.clone(),
            None => projects.push(project.clone()),
        }
        self.save_projects(&projects)
    }

    pub fn archive_project(&self, project_id: &str) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut projects = self.load_projects()?;
        match projects.iter_mut().find(|p| p.id == project_id) {
            Some(project) => {
                project.archived = true;
                project.archived_at = Some(Utc::now());
                self.save_projects(&projects)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deleting a project does not cascade to its synced tasks.
    pub fn delete_project(&self, project_id: &str) -> DbResult<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let mut projects = self.load_projects()?;
        let before = projects.len();
        projects.retain(|p| p.id != project_id);
        if projects.len() == before {
            return Ok(false);
        }
        self.save_projects(&projects)?;
        Ok(true)
    }
}

/// Initial accounts written to `users.json` on first run. Passwords are
/// hashed here so the file never carries plaintext.
fn default_users() -> BTreeMap<String, User> {
    let mut users = BTreeMap::new();
    let seed = |password: &str| match hash(password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            error!("Failed to hash seed password: {}", e);
            String::new()
        }
    };
    users.insert(
        "admin".to_string(),
        User {
            password_hash: seed("admin"),
            role: "admin".to_string(),
            name: "Martin".to_string(),
            avatar: "👨‍💻".to_string(),
            visible_modules: vec![
                "Toyota".to_string(),
                "Volkswagen".to_string(),
                "Others".to_string(),
                "e-CMR Manager".to_string(),
                "Vagoni".to_string(),
                "Statistika".to_string(),
                "Fakture".to_string(),
                "Produktivnost".to_string(),
                "Admin".to_string(),
            ],
            dashboard_layout: vec![
                "kpi_stock".to_string(),
                "kpi_dispatched".to_string(),
                "kpi_loading".to_string(),
                "kpi_customs".to_string(),
                "flow_chart".to_string(),
            ],
        },
    );
    users.insert(
        "operativa".to_string(),
        User {
            password_hash: seed("op"),
            role: "operativa".to_string(),
            name: "Operator".to_string(),
            avatar: "👷".to_string(),
            visible_modules: vec!["Toyota".to_string(), "Volkswagen".to_string()],
            dashboard_layout: vec!["kpi_stock".to_string()],
        },
    );
    users.insert(
        "service".to_string(),
        User {
            password_hash: seed("srv"),
            role: "service_admin".to_string(),
            name: "ServiceAdmin".to_string(),
            avatar: "🔧".to_string(),
            visible_modules: vec!["Toyota".to_string()],
            dashboard_layout: vec![],
        },
    );
    users
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::ProjectStatus;

    fn temp_db() -> (Database, PathBuf) {
        let dir = std::env::temp_dir().join(format!("logiport-db-{}", uuid::Uuid::new_v4()));
        let db = Database::new(&dir).expect("create temp db");
        (db, dir)
    }

    #[test]
    fn seeds_default_users() {
        let (db, dir) = temp_db();
        let users = db.load_users().unwrap();
        assert!(users.contains_key("admin"));
        assert!(users.contains_key("operativa"));
        assert!(!users["admin"].password_hash.is_empty());
        // No plaintext in the file
        assert_ne!(users["admin"].password_hash, "admin");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn user_crud_roundtrip() {
        let (db, dir) = temp_db();
        let user = User {
            password_hash: "x".to_string(),
            role: "operativa".to_string(),
            name: "Test".to_string(),
            avatar: "T".to_string(),
            visible_modules: vec![],
            dashboard_layout: vec![],
        };
        assert!(db.add_user("tester", user.clone()).unwrap());
        // Duplicate username is rejected
        assert!(!db.add_user("tester", user).unwrap());

        let patch = UserSettingsPatch {
            avatar: Some("🚚".to_string()),
            ..Default::default()
        };
        assert!(db.update_user_settings("tester", &patch).unwrap());
        assert_eq!(db.get_user("tester").unwrap().unwrap().avatar, "🚚");

        assert!(db.delete_user("tester").unwrap());
        assert!(db.get_user("tester").unwrap().is_none());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn task_filters_by_user_and_date() {
        let (db, dir) = temp_db();
        db.add_task("admin", "check manifests", "2025-06-01", None)
            .unwrap();
        db.add_task("admin", "other day", "2025-06-02", None).unwrap();
        db.add_task("operativa", "same day", "2025-06-01", None)
            .unwrap();

        let tasks = db.get_user_tasks("admin", "2025-06-01").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "check manifests");

        let by_date = db.get_all_tasks_by_date("2025-06-01").unwrap();
        assert_eq!(by_date.len(), 2);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn task_update_and_delete() {
        let (db, dir) = temp_db();
        let task = db.add_task("admin", "title", "2025-06-01", None).unwrap();
        assert!(db.update_task_status(&task.id, true).unwrap());
        assert!(db.update_task_title(&task.id, "renamed").unwrap());

        let tasks = db.get_user_tasks("admin", "2025-06-01").unwrap();
        assert!(tasks[0].completed);
        assert_eq!(tasks[0].title, "renamed");

        assert!(db.delete_task(&task.id).unwrap());
        assert!(!db.delete_task(&task.id).unwrap());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn parallel_task_writers_keep_every_task() {
        let (db, dir) = temp_db();
        std::thread::scope(|scope| {
            for t in 0..8 {
                let db = &db;
                scope.spawn(move || {
                    for i in 0..25 {
                        db.add_task("admin", &format!("load {}-{}", t, i), "2025-06-01", None)
                            .unwrap();
                        // readers must see a complete file at any point
                        db.get_all_tasks_by_date("2025-06-01").unwrap();
                    }
                });
            }
        });
        assert_eq!(db.get_all_tasks_by_date("2025-06-01").unwrap().len(), 200);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn project_save_is_upsert() {
        let (db, dir) = temp_db();
        let mut project = Project {
            id: "p1".to_string(),
            title: "Vessel week".to_string(),
            description: None,
            category: None,
            status: ProjectStatus::Todo,
            assignees: vec!["admin".to_string()],
            due_date: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            archived: false,
            archived_at: None,
        };
        db.save_project(&project).unwrap();
        project.status = ProjectStatus::Done;
        db.save_project(&project).unwrap();

        let projects = db.get_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].status, ProjectStatus::Done);

        assert!(db.archive_project("p1").unwrap());
        assert!(db.get_project("p1").unwrap().unwrap().archived);

        assert!(db.delete_project("p1").unwrap());
        assert!(!db.delete_project("p1").unwrap());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn delete_project_does_not_cascade_tasks() {
        let (db, dir) = temp_db();
        let project = Project {
            id: "p2".to_string(),
            title: "Customs".to_string(),
            description: None,
            category: None,
            status: ProjectStatus::Todo,
            assignees: vec!["admin".to_string()],
            due_date: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            archived: false,
            archived_at: None,
        };
        db.save_project(&project).unwrap();
        db.add_task("admin", "[Project] Customs", "2025-06-01", Some("p2".to_string()))
            .unwrap();

        db.delete_project("p2").unwrap();
        assert_eq!(db.get_tasks_by_project("p2").unwrap().len(), 1);
        std::fs::remove_dir_all(dir).ok();
    }
}
