use std::time::Duration;

use log::warn;

use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::settings::Setting;
use crate::rate_limit::RateLimiter;

pub mod admin;
pub mod auth;
pub mod content;
pub mod donations;
pub mod meta;
pub mod posts;
pub mod testimonials;

/// Default and ceiling for the plain (non-paginated) public feeds.
pub(crate) const FEED_LIMIT_DEFAULT: i64 = 50;
pub(crate) const FEED_LIMIT_MAX: i64 = 100;

/// Shared throttle for login and the public submission endpoints. Keys mix
/// a per-endpoint bucket with the hashed client address; limits come from
/// settings so operators can tune them without a rebuild.
pub(crate) fn throttle(
    pool: &DbPool,
    limiter: &RateLimiter,
    bucket: &str,
    ip: &str,
) -> Result<(), ApiError> {
    let key = format!("{}:{}", bucket, crate::auth::hash_ip(ip));
    let max_attempts = Setting::get_i64(pool, "rate_limit_max").max(1) as u64;
    let window_secs = Setting::get_i64(pool, "rate_limit_window_secs").max(1) as u64;
    if limiter.check_and_record(&key, max_attempts, Duration::from_secs(window_secs)) {
        Ok(())
    } else {
        warn!("rate limited: {}", key);
        Err(ApiError::RateLimited)
    }
}

/// Required text field: present and non-blank after trimming, or a 400.
pub(crate) fn require_text(value: Option<&str>, field: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::Validation(format!("{} is required", field))),
    }
}

/// Optional text columns treat whitespace-only input as an explicit clear.
pub(crate) fn blank_to_null(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
