use chrono::{Duration, Utc};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use sha2::{Digest, Sha256};

use crate::db::DbPool;
use crate::errors::StoreError;
use crate::models::settings::Setting;
use crate::models::user::User;

// ── Client IP request guard ──

/// Best-effort client address for rate-limit keys: proxy headers first,
/// then the socket peer. Only ever used hashed.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        if let Some(ip) = headers.get_one("X-Real-IP") {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Outcome::Success(ClientIp(ip.to_string()));
            }
        }

        // X-Forwarded-For: client, proxy1, proxy2 — leftmost is the client
        if let Some(forwarded) = headers.get_one("X-Forwarded-For") {
            if let Some(ip) = forwarded.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

// ── Bearer token guard ──

/// The raw token from `Authorization: Bearer <token>`. Logout needs it to
/// know which session to drop.
pub struct BearerToken(pub String);

fn bearer_token(request: &Request<'_>) -> Option<String> {
    let header = request.headers().get_one("Authorization")?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match bearer_token(request) {
            Some(token) => Outcome::Success(BearerToken(token)),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

// ── Authenticated user guards ──
// Guard failures abort straight to the JSON catchers (401/403/503) — this
// API has no login page to forward to.

/// Guard: any active user with a live session.
pub struct AuthenticatedUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_bearer_user(request).await {
            Ok(Some(user)) => Outcome::Success(AuthenticatedUser { user }),
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

/// Guard: requires role = admin.
pub struct AdminUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_bearer_user(request).await {
            Ok(Some(user)) if user.is_admin() => Outcome::Success(AdminUser { user }),
            Ok(Some(_)) => Outcome::Error((Status::Forbidden, ())),
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

async fn resolve_bearer_user(request: &Request<'_>) -> Result<Option<User>, StoreError> {
    let Some(pool) = request.guard::<&State<DbPool>>().await.succeeded() else {
        return Ok(None);
    };
    let Some(token) = bearer_token(request) else {
        return Ok(None);
    };
    session_user(pool, &token)
}

// ── Password utilities ──

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// ── Session management ──

pub fn create_session(pool: &DbPool, user_id: i64) -> Result<String, StoreError> {
    let expiry_hours = match Setting::get_i64(pool, "session_expiry_hours") {
        h if h > 0 => h,
        _ => 24,
    };
    let token = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let expires = now + Duration::hours(expiry_hours);

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            token,
            user_id,
            now.format("%Y-%m-%d %H:%M:%S").to_string(),
            expires.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;

    Ok(token)
}

pub fn destroy_session(pool: &DbPool, token: &str) -> Result<(), StoreError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", rusqlite::params![token])?;
    Ok(())
}

/// Resolve a token to its user: session must be unexpired and the account
/// active. An expired or unknown token reads as "no user", never an error.
pub fn session_user(pool: &DbPool, token: &str) -> Result<Option<User>, StoreError> {
    let conn = pool.get()?;
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();

    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.password_hash, u.first_name, u.last_name, u.role,
                u.is_active, u.created_at
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > ?2",
    )?;

    match stmt.query_row(rusqlite::params![token, now], User::from_row) {
        Ok(user) if user.is_active => Ok(Some(user)),
        Ok(_) => Ok(None),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}
