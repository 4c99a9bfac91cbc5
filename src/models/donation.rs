use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::errors::StoreError;

#[derive(Debug, Serialize)]
pub struct Donation {
    pub id: i64,
    pub amount: f64,
    pub currency: String,
    pub donor_name: String,
    pub donor_email: String,
    pub message: Option<String>,
    pub is_anonymous: bool,
    pub created_at: NaiveDateTime,
}

pub struct NewDonation<'a> {
    pub amount: f64,
    pub currency: &'a str,
    pub donor_name: &'a str,
    pub donor_email: &'a str,
    pub message: Option<&'a str>,
    pub is_anonymous: bool,
}

impl Donation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Donation {
            id: row.get("id")?,
            amount: row.get("amount")?,
            currency: row.get("currency")?,
            donor_name: row.get("donor_name")?,
            donor_email: row.get("donor_email")?,
            message: row.get("message")?,
            is_anonymous: row.get("is_anonymous")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(pool: &DbPool, donation: &NewDonation) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO donations (amount, currency, donor_name, donor_email, message, is_anonymous)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                donation.amount,
                donation.currency,
                donation.donor_name,
                donation.donor_email,
                donation.message,
                donation.is_anonymous,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find(pool: &DbPool, id: i64) -> Result<Option<Donation>, StoreError> {
        let conn = pool.get()?;
        let result = conn.query_row(
            "SELECT id, amount, currency, donor_name, donor_email, message, is_anonymous, created_at
             FROM donations WHERE id = ?1",
            params![id],
            Self::from_row,
        );
        match result {
            Ok(donation) => Ok(Some(donation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn recent(pool: &DbPool, limit: i64) -> Result<Vec<Donation>, StoreError> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, amount, currency, donor_name, donor_email, message, is_anonymous, created_at
             FROM donations ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn total_amount(pool: &DbPool) -> Result<f64, StoreError> {
        let conn = pool.get()?;
        conn.query_row("SELECT COALESCE(SUM(amount), 0.0) FROM donations", [], |row| {
            row.get(0)
        })
        .map_err(Into::into)
    }

    pub fn count(pool: &DbPool) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        conn.query_row("SELECT COUNT(*) FROM donations", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Supporter-wall shape: anonymous donors are masked and email is
    /// never exposed, whatever the caller's privileges.
    pub fn public_json(&self) -> Value {
        let name = if self.is_anonymous {
            "Anonymous"
        } else {
            self.donor_name.as_str()
        };
        json!({
            "id": self.id,
            "amount": self.amount,
            "currency": self.currency,
            "donor_name": name,
            "message": self.message,
            "created_at": self.created_at,
        })
    }
}
