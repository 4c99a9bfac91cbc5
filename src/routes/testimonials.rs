use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{require_text, FEED_LIMIT_DEFAULT, FEED_LIMIT_MAX};
use crate::auth::ClientIp;
use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::testimonial::Testimonial;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Deserialize)]
pub struct TestimonialRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub rating: Option<i64>,
}

#[post("/", format = "json", data = "<body>")]
pub fn testimonial_create(
    pool: &State<DbPool>,
    limiter: &State<Arc<RateLimiter>>,
    client_ip: ClientIp,
    body: Json<TestimonialRequest>,
) -> Result<(Status, Json<Value>), ApiError> {
    super::throttle(pool, limiter, "testimonial", &client_ip.0)?;

    let body = body.into_inner();
    let name = require_text(body.name.as_deref(), "Name")?;
    let content = require_text(body.content.as_deref(), "Content")?;
    let rating = body.rating.unwrap_or(5);
    if !(1..=5).contains(&rating) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let id = Testimonial::create(pool, &name, &content, rating)?;
    let testimonial = Testimonial::find(pool, id)?
        .ok_or_else(|| ApiError::Internal("recorded testimonial not readable".to_string()))?;
    Ok((
        Status::Created,
        Json(json!({
            "success": true,
            "message": "Thank you for sharing your story!",
            "data": testimonial
        })),
    ))
}

#[get("/?<limit>")]
pub fn testimonial_list(pool: &State<DbPool>, limit: Option<i64>) -> Result<Json<Value>, ApiError> {
    let limit = limit.unwrap_or(FEED_LIMIT_DEFAULT).clamp(1, FEED_LIMIT_MAX);
    let items = Testimonial::recent(pool, limit)?;
    Ok(Json(json!({ "success": true, "data": items })))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![testimonial_create, testimonial_list]
}
