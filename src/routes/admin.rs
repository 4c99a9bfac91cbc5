use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::donation::Donation;
use crate::models::post::{Post, PostFilter};
use crate::models::user::User;

/// Aggregate counters for the staff landing page. Any signed-in account
/// may read these; mutation stays behind the admin-only routes.
#[get("/dashboard")]
pub fn dashboard(_user: AuthenticatedUser, pool: &State<DbPool>) -> Result<Json<Value>, ApiError> {
    let all_posts = PostFilter {
        status: None,
        search: None,
    };

    let total_donations = Donation::total_amount(pool)?;
    let donation_count = Donation::count(pool)?;
    let user_count = User::count(pool)?;
    let post_count = Post::count(pool, &all_posts)?;
    let recent_donations: Vec<Value> = Donation::recent(pool, 5)?
        .iter()
        .map(Donation::public_json)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "total_donations": total_donations,
            "donation_count": donation_count,
            "user_count": user_count,
            "post_count": post_count,
            "recent_donations": recent_donations,
        }
    })))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![dashboard]
}
