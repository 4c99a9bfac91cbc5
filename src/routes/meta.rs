use chrono::Utc;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::models::settings::Setting;

#[get("/")]
pub fn welcome(pool: &State<DbPool>) -> Json<Value> {
    let site_name = Setting::get_or(pool, "site_name", "Almoner");
    Json(json!({
        "success": true,
        "message": format!("Welcome to the {} API", site_name),
        "data": {
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "posts": "/posts",
                "auth": "/auth",
                "donations": "/donations",
                "testimonials": "/testimonials",
                "content": "/content",
                "dashboard": "/admin/dashboard",
                "health": "/health",
            }
        }
    }))
}

/// Liveness probe. Deliberately touches nothing stateful: a wedged
/// database shows up on real endpoints as 503, not here.
#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        }
    }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![welcome, health]
}
