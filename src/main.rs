#[macro_use]
extern crate rocket;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};

mod auth;
mod boot;
mod db;
mod errors;
mod models;
mod rate_limit;
mod routes;
mod slugs;
mod uploads;

use db::DbPool;
use rate_limit::RateLimiter;
use uploads::{DiskImageStore, ImageStore};

/// How often the rate-limit map is swept of stale keys.
const LIMITER_SWEEP_SECS: u64 = 3600;

/// Everything mounted and managed. Production and the test harness build
/// the same app; only the pool and the image store differ.
pub fn build_app(pool: DbPool, image_store: Arc<dyn ImageStore>) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .manage(image_store)
        .manage(Arc::new(RateLimiter::new()))
        .attach(AdHoc::on_liftoff("limiter sweep", |rocket| {
            Box::pin(async move {
                let Some(limiter) = rocket.state::<Arc<RateLimiter>>().cloned() else {
                    return;
                };
                rocket::tokio::spawn(async move {
                    let mut tick = rocket::tokio::time::interval(Duration::from_secs(
                        LIMITER_SWEEP_SECS,
                    ));
                    loop {
                        tick.tick().await;
                        limiter.cleanup(Duration::from_secs(LIMITER_SWEEP_SECS));
                    }
                });
            })
        }))
        .mount("/", routes::meta::routes())
        .mount("/auth", routes::auth::routes())
        .mount("/posts", routes::posts::routes())
        .mount("/donations", routes::donations::routes())
        .mount("/testimonials", routes::testimonials::routes())
        .mount("/content", routes::content::routes())
        .mount("/admin", routes::admin::routes())
        .register("/", errors::catchers())
}

fn data_dir() -> PathBuf {
    std::env::var("ALMONER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[launch]
fn rocket() -> _ {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = data_dir();
    boot::run(&data_dir);

    let pool = db::init_pool(&data_dir.join("almoner.db"))
        .expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed defaults");

    let image_store: Arc<dyn ImageStore> =
        Arc::new(DiskImageStore::new(data_dir.join("uploads/images")));

    info!(
        "almoner {} starting; data dir: {}",
        env!("CARGO_PKG_VERSION"),
        data_dir.display()
    );

    build_app(pool, image_store)
}
