use chrono::NaiveDateTime;
use rusqlite::{params, Row, ToSql};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::DbPool;
use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

/// A fully hydrated post row. `author` (display name) and `author_email`
/// are present only when the query joined the users table.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub meta_description: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub author_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing)]
    pub author_email: Option<String>,
}

/// Listing projection — everything but the content body.
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub meta_description: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub author: Option<String>,
}

/// The columns the write paths read before mutating a row.
#[derive(Debug)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub featured_image: Option<String>,
}

/// Status/search predicate shared by the list and count queries so the
/// pagination total always reflects the same filter as the page.
#[derive(Debug, Default)]
pub struct PostFilter<'a> {
    pub status: Option<&'a str>,
    pub search: Option<&'a str>,
}

impl PostFilter<'_> {
    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = self.status {
            clauses.push("p.status = ?");
            params.push(Box::new(status.to_string()));
        }

        if let Some(search) = self.search.filter(|s| !s.is_empty()) {
            clauses.push("(p.title LIKE ? OR p.content LIKE ? OR p.excerpt LIKE ?)");
            let pattern = format!("%{}%", search);
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (sql, params)
    }
}

/// Partial-update accumulator. Columns land in SET order; `updated_at`
/// is appended by `Post::update` on every non-empty set.
#[derive(Default)]
pub struct UpdateSet {
    columns: Vec<&'static str>,
    values: Vec<Box<dyn ToSql>>,
}

impl UpdateSet {
    pub fn push<V: ToSql + 'static>(&mut self, column: &'static str, value: V) {
        self.columns.push(column);
        self.values.push(Box::new(value));
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }
}

fn parse_tags(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

const DETAIL_COLS: &str = "p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image, \
     p.meta_description, p.tags, p.status, p.author_id, p.created_at, p.updated_at, \
     TRIM(u.first_name || ' ' || u.last_name) AS author";

impl Post {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Post {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            content: row.get("content")?,
            excerpt: row.get("excerpt")?,
            featured_image: row.get("featured_image")?,
            meta_description: row.get("meta_description")?,
            tags: parse_tags(row.get("tags")?),
            status: row.get("status")?,
            author_id: row.get("author_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            author: row.get("author").ok().flatten(),
            author_email: row.get("author_email").ok().flatten(),
        })
    }

    /// Public read path: published posts only. A draft is indistinguishable
    /// from a missing row here — that asymmetry is the draft privacy rule.
    pub fn find_published_by_slug(pool: &DbPool, slug: &str) -> Result<Option<Self>, StoreError> {
        let conn = pool.get()?;
        let sql = format!(
            "SELECT {}, u.email AS author_email
             FROM posts p LEFT JOIN users u ON u.id = p.author_id
             WHERE p.slug = ?1 AND p.status = 'published'",
            DETAIL_COLS
        );
        match conn.query_row(&sql, params![slug], Self::from_row) {
            Ok(post) => Ok(Some(post)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Administrative read path: any status, author display name attached.
    pub fn find_with_author(pool: &DbPool, id: i64) -> Result<Option<Self>, StoreError> {
        let conn = pool.get()?;
        let sql = format!(
            "SELECT {}
             FROM posts p LEFT JOIN users u ON u.id = p.author_id
             WHERE p.id = ?1",
            DETAIL_COLS
        );
        match conn.query_row(&sql, params![id], Self::from_row) {
            Ok(post) => Ok(Some(post)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_row(pool: &DbPool, id: i64) -> Result<Option<PostRow>, StoreError> {
        let conn = pool.get()?;
        let result = conn.query_row(
            "SELECT id, title, slug, featured_image FROM posts WHERE id = ?1",
            params![id],
            |row| {
                Ok(PostRow {
                    id: row.get("id")?,
                    title: row.get("title")?,
                    slug: row.get("slug")?,
                    featured_image: row.get("featured_image")?,
                })
            },
        );
        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(
        pool: &DbPool,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostSummary>, StoreError> {
        let conn = pool.get()?;
        let (where_sql, mut query_params) = filter.where_clause();
        let sql = format!(
            "SELECT p.id, p.title, p.slug, p.excerpt, p.featured_image, p.meta_description, \
                    p.tags, p.status, p.created_at, p.updated_at, \
                    TRIM(u.first_name || ' ' || u.last_name) AS author \
             FROM posts p LEFT JOIN users u ON u.id = p.author_id{} \
             ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            where_sql
        );
        query_params.push(Box::new(limit));
        query_params.push(Box::new(offset));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = query_params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(PostSummary {
                id: row.get("id")?,
                title: row.get("title")?,
                slug: row.get("slug")?,
                excerpt: row.get("excerpt")?,
                featured_image: row.get("featured_image")?,
                meta_description: row.get("meta_description")?,
                tags: parse_tags(row.get("tags")?),
                status: row.get("status")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
                author: row.get::<_, Option<String>>("author")?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Count with the same predicate as `list`, independent of the page
    /// actually fetched.
    pub fn count(pool: &DbPool, filter: &PostFilter) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        let (where_sql, query_params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM posts p{}", where_sql);
        let param_refs: Vec<&dyn ToSql> = query_params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(Into::into)
    }

    /// Every slug starting with `base`, for collision resolution. On update
    /// the record's own row is excluded so an unchanged title keeps its slug.
    pub fn slugs_with_prefix(
        pool: &DbPool,
        base: &str,
        exclude_id: Option<i64>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = pool.get()?;
        let pattern = format!("{}%", base);

        let slugs = match exclude_id {
            Some(id) => {
                let mut stmt =
                    conn.prepare("SELECT slug FROM posts WHERE slug LIKE ?1 AND id != ?2")?;
                let rows = stmt.query_map(params![pattern, id], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            }
            None => {
                let mut stmt = conn.prepare("SELECT slug FROM posts WHERE slug LIKE ?1")?;
                let rows = stmt.query_map(params![pattern], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            }
        };

        Ok(slugs)
    }

    pub fn insert(pool: &DbPool, post: &NewPost) -> Result<i64, StoreError> {
        let conn = pool.get()?;
        let tags_json =
            serde_json::to_string(post.tags).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO posts (title, slug, content, excerpt, featured_image, \
             meta_description, tags, status, author_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                post.title,
                post.slug,
                post.content,
                post.excerpt,
                post.featured_image,
                post.meta_description,
                tags_json,
                post.status,
                post.author_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Apply a non-empty update set; refreshes `updated_at` as part of the
    /// same statement. Ok(false) means the row disappeared underneath us.
    pub fn update(pool: &DbPool, id: i64, set: &UpdateSet) -> Result<bool, StoreError> {
        let conn = pool.get()?;
        let assignments: Vec<String> =
            set.columns.iter().map(|c| format!("{} = ?", c)).collect();
        let sql = format!(
            "UPDATE posts SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            assignments.join(", ")
        );
        let mut param_refs: Vec<&dyn ToSql> = set.values.iter().map(|v| v.as_ref()).collect();
        param_refs.push(&id);
        let changed = conn.execute(&sql, param_refs.as_slice())?;
        Ok(changed > 0)
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, StoreError> {
        let conn = pool.get()?;
        let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Detail shape for the public read path: author folded into an object
    /// rather than the flat display-name column the admin paths return.
    pub fn detail_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "slug": self.slug,
            "content": self.content,
            "excerpt": self.excerpt,
            "featured_image": self.featured_image,
            "meta_description": self.meta_description,
            "tags": self.tags,
            "status": self.status,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
            "author": self.author.as_ref().map(|name| json!({
                "name": name,
                "email": self.author_email,
            })),
        })
    }
}

/// Insert payload; the slug arrives already derived.
#[derive(Debug)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub content: &'a str,
    pub excerpt: Option<&'a str>,
    pub featured_image: Option<&'a str>,
    pub meta_description: Option<&'a str>,
    pub tags: &'a [String],
    pub status: &'a str,
    pub author_id: i64,
}
