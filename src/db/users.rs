use crate::errors::VulnFusionError;
use crate::models::{Role, User};
use super::Database;

/// Fields an administrator may change on an account.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub role: Option<Role>,
}

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role: Option<String> = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: role.and_then(|r| r.parse().ok()).unwrap_or_default(),
    })
}

impl Database {
    pub fn create_user(&self, username: &str, password: &str, role: Role) -> Result<User, VulnFusionError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO \"user\" (username, password, role) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, password, role.as_str()],
        ).map_err(|e| VulnFusionError::Database(format!("Failed to create user: {}", e)))?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password: password.to_string(),
            role,
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, VulnFusionError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT id, username, password, role FROM \"user\" WHERE username = ?1",
            rusqlite::params![username],
            user_from_row,
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VulnFusionError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>, VulnFusionError> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT id, username, password, role FROM \"user\" WHERE id = ?1",
            rusqlite::params![id],
            user_from_row,
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(VulnFusionError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn list_users(&self) -> Result<Vec<User>, VulnFusionError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, username, password, role FROM \"user\" ORDER BY id")
            .map_err(|e| VulnFusionError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map([], user_from_row)
            .map_err(|e| VulnFusionError::Database(format!("Query error: {}", e)))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(|e| VulnFusionError::Database(format!("Row error: {}", e)))?);
        }
        Ok(users)
    }

    /// Apply the set fields of `update`. Returns false if no such user.
    pub fn update_user(&self, id: i64, update: &UserUpdate) -> Result<bool, VulnFusionError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE \"user\" SET password = COALESCE(?2, password), role = COALESCE(?3, role) WHERE id = ?1",
            rusqlite::params![id, update.password, update.role.map(|r| r.as_str())],
        ).map_err(|e| VulnFusionError::Database(format!("Update failed: {}", e)))?;
        Ok(affected > 0)
    }

    pub fn delete_user(&self, id: i64) -> Result<bool, VulnFusionError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM \"user\" WHERE id = ?1", rusqlite::params![id])
            .map_err(|e| VulnFusionError::Database(format!("Delete failed: {}", e)))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_create_and_get_user() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("testuser", "hash", Role::Admin).unwrap();
        assert!(user.id > 0);

        let got = db.get_user_by_username("testuser").unwrap().unwrap();
        assert_eq!(got, user);

        let by_id = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(by_id.username, "testuser");
    }

    #[test]
    fn test_db_get_nonexistent_user() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_user_by_username("ghost").unwrap().is_none());
        assert!(db.get_user_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_db_duplicate_username_rejected() {
        let db = Database::in_memory().unwrap();
        db.create_user("admin", "a", Role::Admin).unwrap();
        let err = db.create_user("admin", "b", Role::User).unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_db_role_defaults_to_user() {
        let db = Database::in_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            conn.execute("INSERT INTO \"user\" (username, password) VALUES ('plain', 'x')", [])
                .unwrap();
        }
        let user = db.get_user_by_username("plain").unwrap().unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_db_update_user() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("bob", "old", Role::Admin).unwrap();

        let changed = db.update_user(user.id, &UserUpdate { role: Some(Role::User), ..Default::default() }).unwrap();
        assert!(changed);
        let got = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(got.role, Role::User);
        assert_eq!(got.password, "old");

        assert!(!db.update_user(999, &UserUpdate::default()).unwrap());
    }

    #[test]
    fn test_db_list_and_delete_users() {
        let db = Database::in_memory().unwrap();
        let a = db.create_user("a", "x", Role::User).unwrap();
        db.create_user("b", "y", Role::User).unwrap();
        assert_eq!(db.list_users().unwrap().len(), 2);

        assert!(db.delete_user(a.id).unwrap());
        assert!(!db.delete_user(a.id).unwrap());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }
}
