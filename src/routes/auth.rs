use std::sync::Arc;

use log::info;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{self, AuthenticatedUser, BearerToken, ClientIp};
use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::user::User;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[post("/login", format = "json", data = "<body>")]
pub fn login(
    pool: &State<DbPool>,
    limiter: &State<Arc<RateLimiter>>,
    client_ip: ClientIp,
    body: Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    // Credential guessing is throttled per hashed client address.
    super::throttle(pool, limiter, "login", &client_ip.0)?;

    // An unknown email, a deactivated account and a wrong password are
    // indistinguishable to the caller.
    let user = match User::find_by_email(pool, &email)? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::Unauthorized("Invalid credentials".to_string())),
    };
    if !auth::verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = auth::create_session(pool, user.id)?;
    info!("login: user {} ({})", user.id, user.role);

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "data": { "token": token, "user": user.public_json() }
    })))
}

#[post("/logout")]
pub fn logout(
    _user: AuthenticatedUser,
    token: BearerToken,
    pool: &State<DbPool>,
) -> Result<Json<Value>, ApiError> {
    auth::destroy_session(pool, &token.0)?;
    Ok(Json(json!({ "success": true, "message": "Logged out" })))
}

#[get("/me")]
pub fn me(user: AuthenticatedUser) -> Json<Value> {
    Json(json!({ "success": true, "data": user.user.public_json() }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, logout, me]
}
