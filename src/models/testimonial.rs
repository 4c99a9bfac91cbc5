use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::db::DbPool;
use crate::errors::StoreError;

#[derive(Debug, Serialize)]
pub struct Testimonial {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub rating: i64,
    pub created_at: NaiveDateTime,
}

impl Testimonial {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Testimonial {
            id: row.get("id")?,
            name: row.get("name")?,
            content: row.get("content")?,
            rating: row.get("rating")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        name: &str,
        content: &str,
        rating: i64,
    ) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO testimonials (name, content, rating) VALUES (?1, ?2, ?3)",
            params![name, content, rating],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find(pool: &DbPool, id: i64) -> Result<Option<Testimonial>, StoreError> {
        let conn = pool.get()?;
        let result = conn.query_row(
            "SELECT id, name, content, rating, created_at FROM testimonials WHERE id = ?1",
            params![id],
            Self::from_row,
        );
        match result {
            Ok(testimonial) => Ok(Some(testimonial)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn recent(pool: &DbPool, limit: i64) -> Result<Vec<Testimonial>, StoreError> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, content, rating, created_at
             FROM testimonials ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}
