use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::site_content::SiteContent;

/// Editable page sections the frontend renders (mission, about, and so
/// on). Read-only over HTTP; the rows are seeded and edited in place.
#[get("/")]
pub fn content_list(pool: &State<DbPool>) -> Result<Json<Value>, ApiError> {
    let sections = SiteContent::active(pool)?;
    Ok(Json(json!({ "success": true, "data": sections })))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![content_list]
}
