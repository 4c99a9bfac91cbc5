use std::path::Path;

use log::{info, warn};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_pool(db_path: &Path) -> Result<DbPool, Box<dyn std::error::Error>> {
    // WAL for concurrent readers; foreign_keys is per-connection, so it
    // goes in the init hook rather than a one-off PRAGMA.
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|c| c.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder().max_size(10).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Authors / staff accounts
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            role TEXT NOT NULL DEFAULT 'user',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Bearer-token sessions
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Blog posts. AUTOINCREMENT so ids are never reused after a
        -- delete; slug uniqueness is the arbiter for concurrent writes.
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            content TEXT NOT NULL,
            excerpt TEXT,
            featured_image TEXT,
            meta_description TEXT,
            tags TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            author_id INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS donations (
            id INTEGER PRIMARY KEY,
            amount REAL NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            donor_name TEXT NOT NULL,
            donor_email TEXT NOT NULL,
            message TEXT,
            is_anonymous INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS testimonials (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            rating INTEGER NOT NULL DEFAULT 5,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Editable site copy (mission statement, about text, ...)
        CREATE TABLE IF NOT EXISTS site_content (
            id INTEGER PRIMARY KEY,
            key_name TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);
        CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_donations_created ON donations(created_at);
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        ("site_name", "Almoner"),
        ("posts_per_page", "10"),
        ("uploads_max_mb", "10"),
        ("rate_limit_max", "5"),
        ("rate_limit_window_secs", "900"),
        ("session_expiry_hours", "24"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    // First-boot admin account. Default password: "admin" — must be
    // changed on first login.
    let admin_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;

    if admin_count == 0 {
        let hash = bcrypt::hash("admin", bcrypt::DEFAULT_COST)?;
        conn.execute(
            "INSERT INTO users (email, password_hash, first_name, last_name, role)
             VALUES ('admin@example.org', ?1, 'Site', 'Admin', 'admin')",
            params![hash],
        )?;
        warn!("seeded default admin account admin@example.org — change its password");
    }

    let content_defaults = [
        (
            "mission",
            "Our Mission",
            "We believe every community deserves access to food, shelter, and education. \
             Your support funds local programs that make that possible.",
        ),
        (
            "about",
            "About Us",
            "Founded by volunteers, we partner with neighborhood organizations to direct \
             donations where they have the most impact.",
        ),
        (
            "get_involved",
            "Get Involved",
            "Volunteer, donate, or share our work — every contribution counts.",
        ),
    ];

    for (key_name, title, body) in content_defaults {
        conn.execute(
            "INSERT OR IGNORE INTO site_content (key_name, title, body) VALUES (?1, ?2, ?3)",
            params![key_name, title, body],
        )?;
    }

    info!("database ready");
    Ok(())
}
