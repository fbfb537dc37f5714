//! User rows. Identity management (PIN login, sessions) lives in the auth
//! subsystem; the core only loads handles, names, roles and the active flag.

use turso::{Row, Value};

use super::{Store, StoreError, exec, opt_text_value, req_bool, req_i64, req_text, text_value};
use crate::domain::Role;

/// A stored user.
#[derive(Debug, Clone)]
pub struct UserRow {
    /// Internal handle.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: Role,
    /// Deactivated users cannot authenticate.
    pub is_active: bool,
}

fn row_user(row: &Row) -> Result<UserRow, StoreError> {
    let role_text = req_text(row, 2, "role")?;
    Ok(UserRow {
        id: req_i64(row, 0, "id")?,
        name: req_text(row, 1, "name")?,
        role: Role::from_str_case_insensitive(&role_text)
            .ok_or_else(|| StoreError::MissingField(format!("role: {role_text}")))?,
        is_active: req_bool(row, 3, "is_active")?,
    })
}

impl Store {
    /// Load one user by handle.
    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserRow>, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, name, role, is_active FROM users WHERE id = ?",
                vec![Value::Integer(user_id)],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        match rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            Some(row) => Ok(Some(row_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a user row. The auth subsystem seeds users out-of-band; the
    /// server itself only needs this for tests and first-run provisioning.
    pub async fn insert_user(
        &self,
        name: &str,
        pin_hash: &str,
        pin_lookup: &str,
        role: Role,
        photo_ref: Option<&str>,
    ) -> Result<i64, StoreError> {
        let conn = self.connect()?;
        exec(
            &conn,
            "INSERT INTO users (name, pin_hash, pin_lookup, role, photo_ref) \
             VALUES (?, ?, ?, ?, ?)",
            vec![
                text_value(name),
                text_value(pin_hash),
                text_value(pin_lookup),
                text_value(role.as_str()),
                opt_text_value(photo_ref),
            ],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT id FROM users WHERE pin_lookup = ?",
                vec![text_value(pin_lookup)],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .ok_or(StoreError::NotFound)?;
        req_i64(&row, 0, "id")
    }
}
