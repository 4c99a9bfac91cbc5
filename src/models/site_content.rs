use chrono::NaiveDateTime;
use rusqlite::Row;
use serde::Serialize;

use crate::db::DbPool;
use crate::errors::StoreError;

/// Editable page sections (mission statement, about text, and so on),
/// keyed by a stable name the frontend looks up.
#[derive(Debug, Serialize)]
pub struct SiteContent {
    pub id: i64,
    pub key_name: String,
    pub title: String,
    pub body: String,
    pub updated_at: NaiveDateTime,
}

impl SiteContent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SiteContent {
            id: row.get("id")?,
            key_name: row.get("key_name")?,
            title: row.get("title")?,
            body: row.get("body")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn active(pool: &DbPool) -> Result<Vec<SiteContent>, StoreError> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, key_name, title, body, updated_at
             FROM site_content WHERE is_active = 1 ORDER BY key_name",
        )?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}
