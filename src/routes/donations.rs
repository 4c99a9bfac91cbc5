use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{blank_to_null, require_text, FEED_LIMIT_DEFAULT, FEED_LIMIT_MAX};
use crate::auth::ClientIp;
use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::donation::{Donation, NewDonation};
use crate::rate_limit::RateLimiter;

#[derive(Debug, Deserialize)]
pub struct DonationRequest {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[post("/", format = "json", data = "<body>")]
pub fn donation_create(
    pool: &State<DbPool>,
    limiter: &State<Arc<RateLimiter>>,
    client_ip: ClientIp,
    body: Json<DonationRequest>,
) -> Result<(Status, Json<Value>), ApiError> {
    super::throttle(pool, limiter, "donation", &client_ip.0)?;

    let body = body.into_inner();
    let amount = body.amount.unwrap_or(0.0);
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::Validation(
            "A positive donation amount is required".to_string(),
        ));
    }
    let donor_name = require_text(body.donor_name.as_deref(), "Donor name")?;
    let donor_email = require_text(body.donor_email.as_deref(), "Donor email")?;
    let currency = body
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("USD")
        .to_uppercase();
    let message = blank_to_null(body.message);

    let id = Donation::create(
        pool,
        &NewDonation {
            amount,
            currency: &currency,
            donor_name: &donor_name,
            donor_email: &donor_email,
            message: message.as_deref(),
            is_anonymous: body.is_anonymous,
        },
    )?;

    let donation = Donation::find(pool, id)?
        .ok_or_else(|| ApiError::Internal("recorded donation not readable".to_string()))?;
    Ok((
        Status::Created,
        Json(json!({
            "success": true,
            "message": "Thank you for your donation!",
            "data": donation.public_json()
        })),
    ))
}

/// Supporter wall: newest first, donor emails withheld and anonymous
/// donors masked.
#[get("/?<limit>")]
pub fn donation_list(pool: &State<DbPool>, limit: Option<i64>) -> Result<Json<Value>, ApiError> {
    let limit = limit.unwrap_or(FEED_LIMIT_DEFAULT).clamp(1, FEED_LIMIT_MAX);
    let items: Vec<Value> = Donation::recent(pool, limit)?
        .iter()
        .map(Donation::public_json)
        .collect();
    Ok(Json(json!({ "success": true, "data": items })))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![donation_create, donation_list]
}
