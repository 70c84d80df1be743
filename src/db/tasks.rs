use chrono::Utc;
use crate::errors::VulnFusionError;
use crate::models::{Task, TaskStatus};
use super::{timestamp_column, Database};

const TASK_COLUMNS: &str = "id, user_id, target, template, created_at, status";

fn task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let status: Option<String> = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        target: row.get(2)?,
        template: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        status: status.and_then(|s| s.parse().ok()).unwrap_or_default(),
    })
}

impl Database {
    pub fn create_task(&self, user_id: i64, target: &str, template: &str) -> Result<Task, VulnFusionError> {
        let conn = self.lock()?;
        let created_at = Utc::now();
        let status = TaskStatus::Pending;
        conn.execute(
            "INSERT INTO task (user_id, target, template, created_at, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![user_id, target, template, created_at.to_rfc3339(), status.as_str()],
        ).map_err(|e| VulnFusionError::Database(format!("Failed to create task: {}", e)))?;

        Ok(Task {
            id: conn.last_insert_rowid(),
            user_id,
            target: target.to_string(),
            template: template.to_string(),
            created_at,
            status,
        })
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>, VulnFusionError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM task WHERE id = ?1", TASK_COLUMNS),
            rusqlite::params![id],
            task_from_row,
        );

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VulnFusionError::Database(format!("Query error: {}", e))),
        }
    }

    /// Tasks owned by `user_id`, newest first.
    pub fn list_tasks_by_user(&self, user_id: i64) -> Result<Vec<Task>, VulnFusionError> {
        self.query_tasks(
            &format!("SELECT {} FROM task WHERE user_id = ?1 ORDER BY created_at DESC, id DESC", TASK_COLUMNS),
            rusqlite::params![user_id],
        )
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, VulnFusionError> {
        self.query_tasks(
            &format!("SELECT {} FROM task ORDER BY created_at DESC, id DESC", TASK_COLUMNS),
            [],
        )
    }

    pub fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<bool, VulnFusionError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE task SET status = ?2 WHERE id = ?1",
            rusqlite::params![id, status.as_str()],
        ).map_err(|e| VulnFusionError::Database(format!("Update failed: {}", e)))?;
        Ok(affected > 0)
    }

    /// Delete a task together with its results.
    pub fn delete_task(&self, id: i64) -> Result<bool, VulnFusionError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()
            .map_err(|e| VulnFusionError::Database(format!("Transaction failed: {}", e)))?;
        tx.execute("DELETE FROM result WHERE task_id = ?1", rusqlite::params![id])
            .map_err(|e| VulnFusionError::Database(format!("Delete failed: {}", e)))?;
        let affected = tx.execute("DELETE FROM task WHERE id = ?1", rusqlite::params![id])
            .map_err(|e| VulnFusionError::Database(format!("Delete failed: {}", e)))?;
        tx.commit()
            .map_err(|e| VulnFusionError::Database(format!("Commit failed: {}", e)))?;
        Ok(affected > 0)
    }

    fn query_tasks<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Task>, VulnFusionError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)
            .map_err(|e| VulnFusionError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map(params, task_from_row)
            .map_err(|e| VulnFusionError::Database(format!("Query error: {}", e)))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|e| VulnFusionError::Database(format!("Row error: {}", e)))?);
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, Severity};

    fn db_with_user() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("scanner", "pw", Role::User).unwrap();
        (db, user.id)
    }

    #[test]
    fn test_db_create_and_get_task() {
        let (db, user_id) = db_with_user();
        let task = db.create_task(user_id, "https://example.com", "cves").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let got = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(got, task);
        assert!(db.get_task(task.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_db_task_defaults_from_schema() {
        let (db, user_id) = db_with_user();
        {
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO task (user_id, target, template) VALUES (?1, '10.0.0.1', 'network')",
                rusqlite::params![user_id],
            ).unwrap();
        }
        let tasks = db.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert!(tasks[0].created_at <= Utc::now());
    }

    #[test]
    fn test_db_list_tasks_by_user() {
        let (db, user_id) = db_with_user();
        let other = db.create_user("other", "pw", Role::User).unwrap();
        db.create_task(user_id, "a.example", "cves").unwrap();
        db.create_task(user_id, "b.example", "cves").unwrap();
        db.create_task(other.id, "c.example", "cves").unwrap();

        let mine = db.list_tasks_by_user(user_id).unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|t| t.user_id == user_id));
        assert_eq!(db.list_tasks().unwrap().len(), 3);
    }

    #[test]
    fn test_db_update_task_status() {
        let (db, user_id) = db_with_user();
        let task = db.create_task(user_id, "a.example", "cves").unwrap();

        assert!(db.update_task_status(task.id, TaskStatus::Running).unwrap());
        assert_eq!(db.get_task(task.id).unwrap().unwrap().status, TaskStatus::Running);
        assert!(!db.update_task_status(task.id + 1, TaskStatus::Done).unwrap());
    }

    #[test]
    fn test_db_delete_task_removes_results() {
        let (db, user_id) = db_with_user();
        let task = db.create_task(user_id, "a.example", "cves").unwrap();
        db.insert_result(task.id, "a.example", "CVE-2024-0001", Severity::High, None).unwrap();

        assert!(db.delete_task(task.id).unwrap());
        assert!(db.get_task(task.id).unwrap().is_none());
        assert!(db.list_results_by_task(task.id).unwrap().is_empty());
    }
}
