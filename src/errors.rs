use log::error;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, status, Responder, Response};
use rocket::serde::json::Json;
use serde_json::{json, Value};

// ── Data-layer errors ──────────────────────────────────

/// What the model layer can report. Routes convert these into `ApiError`
/// through the `From` impl below, so `?` flows straight from a query to
/// an HTTP response.
#[derive(Debug)]
pub enum StoreError {
    /// No connection could be checked out of the pool.
    Unavailable(r2d2::Error),
    /// A UNIQUE constraint rejected the write. Carries the constraint
    /// text as SQLite reports it, e.g. "posts.slug".
    Unique(String),
    /// Any other driver failure.
    Query(rusqlite::Error),
}

impl StoreError {
    pub fn is_unique_on(&self, constraint: &str) -> bool {
        matches!(self, StoreError::Unique(c) if c.contains(constraint))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "connection pool: {}", e),
            StoreError::Unique(c) => write!(f, "unique constraint: {}", c),
            StoreError::Query(e) => write!(f, "query: {}", e),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Unavailable(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &e {
            if code.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("UNIQUE constraint failed")
            {
                return StoreError::Unique(msg.clone());
            }
        }
        StoreError::Query(e)
    }
}

// ── HTTP error taxonomy ────────────────────────────────

/// Every failure a handler can surface, each with a stable machine-readable
/// kind and an HTTP status. Responds with the standard error envelope:
/// `{"success": false, "error": "<kind>", "message": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NoFieldsToUpdate,
    Unauthorized(String),
    Forbidden,
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    UnsupportedMediaType(String),
    RateLimited,
    Internal(String),
    StoreUnavailable,
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) | ApiError::NoFieldsToUpdate => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::PayloadTooLarge(_) => Status::PayloadTooLarge,
            ApiError::UnsupportedMediaType(_) => Status::UnsupportedMediaType,
            ApiError::RateLimited => Status::TooManyRequests,
            ApiError::Internal(_) => Status::InternalServerError,
            ApiError::StoreUnavailable => Status::ServiceUnavailable,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NoFieldsToUpdate => "no_fields_to_update",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UnsupportedMediaType(_) => "unsupported_media_type",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal_error",
            ApiError::StoreUnavailable => "store_unavailable",
        }
    }

    /// The message shown to the client. Internal causes are logged, not
    /// echoed.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Validation(m)
            | ApiError::Unauthorized(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::PayloadTooLarge(m)
            | ApiError::UnsupportedMediaType(m) => m.clone(),
            ApiError::NoFieldsToUpdate => "No fields to update".to_string(),
            ApiError::Forbidden => "Admin access required".to_string(),
            ApiError::RateLimited => "Too many requests; please try again later".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::StoreUnavailable => "Service temporarily unavailable".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(e) => {
                error!("database pool unavailable: {}", e);
                ApiError::StoreUnavailable
            }
            StoreError::Unique(c) => {
                ApiError::Conflict(format!("A conflicting record already exists ({})", c))
            }
            StoreError::Query(e) => {
                error!("query failed: {}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let http_status = self.status();
        if http_status.code >= 500 {
            if let ApiError::Internal(detail) = &self {
                error!("{} {} -> {}: {}", req.method(), req.uri(), http_status.code, detail);
            }
        }

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.public_message(),
        });

        // Development escape hatch: release builds never carry the cause.
        #[cfg(debug_assertions)]
        {
            if let ApiError::Internal(detail) = &self {
                body["detail"] = json!(detail);
            }
        }

        Response::build_from(Json(body).respond_to(req)?)
            .status(http_status)
            .ok()
    }
}

// ── Catchers ───────────────────────────────────────────
// Unmatched routes, failed request guards, and framework-level rejections
// (oversized bodies, unparseable JSON) all land here so every error the
// service emits wears the same envelope.

fn envelope(kind: &str, message: &str) -> Json<Value> {
    Json(json!({ "success": false, "error": kind, "message": message }))
}

#[catch(400)]
fn bad_request() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::BadRequest,
        envelope("validation_error", "Malformed request"),
    )
}

#[catch(401)]
fn unauthorized() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::Unauthorized,
        envelope("unauthorized", "Authentication required"),
    )
}

#[catch(403)]
fn forbidden() -> status::Custom<Json<Value>> {
    status::Custom(Status::Forbidden, envelope("forbidden", "Admin access required"))
}

#[catch(404)]
fn not_found() -> status::Custom<Json<Value>> {
    status::Custom(Status::NotFound, envelope("not_found", "Resource not found"))
}

#[catch(413)]
fn payload_too_large() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::PayloadTooLarge,
        envelope("payload_too_large", "Request body exceeds the configured limit"),
    )
}

#[catch(422)]
fn unprocessable() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::UnprocessableEntity,
        envelope("validation_error", "Request body could not be parsed"),
    )
}

#[catch(500)]
fn internal_error() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::InternalServerError,
        envelope("internal_error", "Internal server error"),
    )
}

#[catch(503)]
fn service_unavailable() -> status::Custom<Json<Value>> {
    status::Custom(
        Status::ServiceUnavailable,
        envelope("store_unavailable", "Service temporarily unavailable"),
    )
}

#[catch(default)]
fn fallback(status: Status, _req: &Request) -> status::Custom<Json<Value>> {
    status::Custom(status, envelope("error", status.reason_lossy()))
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        payload_too_large,
        unprocessable,
        internal_error,
        service_unavailable,
        fallback,
    ]
}
