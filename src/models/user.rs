use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::errors::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String, // admin, user
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get("id")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            role: row.get("role")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, email, password_hash, first_name, last_name, role, is_active, created_at";

    pub fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, StoreError> {
        let conn = pool.get()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", Self::SELECT_COLS),
            params![email],
            Self::from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count(pool: &DbPool) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn create(
        pool: &DbPool,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        role: &str,
    ) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO users (email, password_hash, first_name, last_name, role)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![email, password_hash, first_name, last_name, role],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Login and profile payload: everything the client may see, never
    /// the password hash.
    pub fn public_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "role": self.role,
        })
    }
}
