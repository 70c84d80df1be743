use chrono::Utc;
use crate::errors::VulnFusionError;
use crate::models::{ScanResult, Severity};
use super::{timestamp_column, Database};

const RESULT_COLUMNS: &str = "id, task_id, target, vulnerability, severity, detail, timestamp";

const SEVERITY_ORDER: &str =
    "CASE severity WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 WHEN 'low' THEN 3 ELSE 4 END";

fn result_from_row(row: &rusqlite::Row) -> rusqlite::Result<ScanResult> {
    let severity: Option<String> = row.get(4)?;
    Ok(ScanResult {
        id: row.get(0)?,
        task_id: row.get(1)?,
        target: row.get(2)?,
        vulnerability: row.get(3)?,
        severity: severity.and_then(|s| s.parse().ok()).unwrap_or_default(),
        detail: row.get(5)?,
        timestamp: timestamp_column(row, 6)?,
    })
}

impl Database {
    pub fn insert_result(
        &self,
        task_id: i64,
        target: &str,
        vulnerability: &str,
        severity: Severity,
        detail: Option<&str>,
    ) -> Result<ScanResult, VulnFusionError> {
        let conn = self.lock()?;
        let timestamp = Utc::now();
        conn.execute(
            "INSERT INTO result (task_id, target, vulnerability, severity, detail, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![task_id, target, vulnerability, severity.as_str(), detail, timestamp.to_rfc3339()],
        ).map_err(|e| VulnFusionError::Database(format!("Failed to insert result: {}", e)))?;

        Ok(ScanResult {
            id: conn.last_insert_rowid(),
            task_id,
            target: target.to_string(),
            vulnerability: vulnerability.to_string(),
            severity,
            detail: detail.map(String::from),
            timestamp,
        })
    }

    /// Results of one task, most severe first.
    pub fn list_results_by_task(&self, task_id: i64) -> Result<Vec<ScanResult>, VulnFusionError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM result WHERE task_id = ?1 ORDER BY {}, id",
            RESULT_COLUMNS, SEVERITY_ORDER
        )).map_err(|e| VulnFusionError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map(rusqlite::params![task_id], result_from_row)
            .map_err(|e| VulnFusionError::Database(format!("Query error: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| VulnFusionError::Database(format!("Row error: {}", e)))?);
        }
        Ok(results)
    }

    pub fn list_results(&self) -> Result<Vec<ScanResult>, VulnFusionError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM result ORDER BY id", RESULT_COLUMNS))
            .map_err(|e| VulnFusionError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map([], result_from_row)
            .map_err(|e| VulnFusionError::Database(format!("Query error: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| VulnFusionError::Database(format!("Row error: {}", e)))?);
        }
        Ok(results)
    }

    pub fn delete_results_by_task(&self, task_id: i64) -> Result<usize, VulnFusionError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM result WHERE task_id = ?1", rusqlite::params![task_id])
            .map_err(|e| VulnFusionError::Database(format!("Delete failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn db_with_task() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("scanner", "pw", Role::User).unwrap();
        let task = db.create_task(user.id, "app.example", "web").unwrap();
        (db, task.id)
    }

    #[test]
    fn test_db_results_ordered_by_severity() {
        let (db, task_id) = db_with_task();
        db.insert_result(task_id, "app.example", "Open redirect", Severity::Low, None).unwrap();
        db.insert_result(task_id, "app.example", "RCE", Severity::Critical, Some("payload")).unwrap();
        db.insert_result(task_id, "app.example", "XSS", Severity::High, None).unwrap();

        let results = db.list_results_by_task(task_id).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.vulnerability.as_str()).collect();
        assert_eq!(names, vec!["RCE", "XSS", "Open redirect"]);
        assert_eq!(results[0].detail.as_deref(), Some("payload"));
    }

    #[test]
    fn test_db_unknown_severity_falls_back_to_default() {
        let (db, task_id) = db_with_task();
        {
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO result (task_id, target, vulnerability, severity) VALUES (?1, 'h', 'v', 'info')",
                rusqlite::params![task_id],
            ).unwrap();
        }
        let results = db.list_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].severity, Severity::Medium);
    }

    #[test]
    fn test_db_delete_results_by_task() {
        let (db, task_id) = db_with_task();
        db.insert_result(task_id, "h", "a", Severity::High, None).unwrap();
        db.insert_result(task_id, "h", "b", Severity::Low, None).unwrap();

        assert_eq!(db.delete_results_by_task(task_id).unwrap(), 2);
        assert_eq!(db.delete_results_by_task(task_id).unwrap(), 0);
    }
}
