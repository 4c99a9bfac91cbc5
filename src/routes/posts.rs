use std::sync::Arc;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::{blank_to_null, require_text};
use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::post::{NewPost, Post, PostFilter, PostRow, PostStatus, UpdateSet};
use crate::models::settings::Setting;
use crate::slugs::{self, SLUG_RETRIES};
use crate::uploads::{self, ImageStore};

/// Hard ceiling on page size, whatever the client asks for.
const MAX_PAGE_SIZE: i64 = 100;

// ── Payloads ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub meta_description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
}

/// Update payload. The two-level Options distinguish a field that was
/// absent (outer None — leave the column alone) from one explicitly sent
/// as null (inner None — clear it).
#[derive(Debug, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub featured_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub meta_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Option<Vec<String>>>,
    pub status: Option<String>,
}

/// Wraps a supplied value in Some so "present as null" survives
/// deserialization; an absent field stays at the None default.
fn present<'de, T, D>(de: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(de).map(Some)
}

// ── Field helpers ──────────────────────────────────────

fn parse_status(raw: &str) -> Result<PostStatus, ApiError> {
    PostStatus::parse(raw)
        .ok_or_else(|| ApiError::Validation("Status must be 'draft' or 'published'".to_string()))
}

/// page >= 1 and a bounded page size; the default size is a setting.
fn page_window(pool: &DbPool, page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let default_limit = match Setting::get_i64(pool, "posts_per_page") {
        n if n > 0 => n,
        _ => 10,
    };
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    // Absurd page numbers saturate instead of overflowing; the resulting
    // offset lands past every row and yields an empty page.
    (page, limit, (page - 1).saturating_mul(limit))
}

fn list_response(
    pool: &DbPool,
    filter: &PostFilter,
    page: i64,
    limit: i64,
    offset: i64,
) -> Result<Json<Value>, ApiError> {
    let items = Post::list(pool, filter, limit, offset)?;
    let total = Post::count(pool, filter)?;
    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };

    Ok(Json(json!({
        "success": true,
        "data": {
            "items": items,
            "pagination": {
                "current_page": page,
                "total_pages": total_pages,
                "total": total,
                "limit": limit,
            }
        }
    })))
}

// ── Listing ────────────────────────────────────────────

/// Public listing: pinned to published posts. A status parameter from an
/// anonymous caller is not honored — drafts stay invisible.
#[get("/?<page>&<limit>&<search>")]
pub fn list_public(
    pool: &State<DbPool>,
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let (page, limit, offset) = page_window(pool, page, limit);
    let filter = PostFilter {
        status: Some(PostStatus::Published.as_str()),
        search: search.as_deref(),
    };
    list_response(pool, &filter, page, limit, offset)
}

/// Admin listing: every status by default, or one picked explicitly.
#[get("/admin?<page>&<limit>&<search>&<status>")]
pub fn list_admin(
    _admin: AdminUser,
    pool: &State<DbPool>,
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
    status: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let status = match status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };
    let (page, limit, offset) = page_window(pool, page, limit);
    let filter = PostFilter {
        status: status.map(PostStatus::as_str),
        search: search.as_deref(),
    };
    list_response(pool, &filter, page, limit, offset)
}

// ── Detail reads ───────────────────────────────────────

#[get("/<slug>")]
pub fn detail_by_slug(pool: &State<DbPool>, slug: &str) -> Result<Json<Value>, ApiError> {
    let post = Post::find_published_by_slug(pool, slug)?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(json!({ "success": true, "data": post.detail_json() })))
}

#[get("/admin/<id>")]
pub fn detail_admin(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    let post = Post::find_with_author(pool, id)?.ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(json!({ "success": true, "data": post.detail_json() })))
}

// ── Write paths ────────────────────────────────────────

#[post("/", format = "json", data = "<body>")]
pub fn post_create(
    admin: AdminUser,
    pool: &State<DbPool>,
    body: Json<CreatePost>,
) -> Result<(Status, Json<Value>), ApiError> {
    let body = body.into_inner();
    let title = require_text(body.title.as_deref(), "Title")?;
    let content = require_text(body.content.as_deref(), "Content")?;
    let status = match body.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => parse_status(raw)?,
        None => PostStatus::Draft,
    };
    let excerpt = blank_to_null(body.excerpt);
    let featured_image = blank_to_null(body.featured_image);
    let meta_description = blank_to_null(body.meta_description);
    let tags = body.tags.unwrap_or_default();

    // Optimistic insert: a concurrent writer can take the derived slug
    // between our read and this insert. The UNIQUE constraint on
    // posts.slug catches that, and we re-derive against refreshed data.
    let mut attempt = 0;
    let id = loop {
        let slug = slugs::derive_unique(pool, &title, None)?;
        let new_post = NewPost {
            title: &title,
            slug: &slug,
            content: &content,
            excerpt: excerpt.as_deref(),
            featured_image: featured_image.as_deref(),
            meta_description: meta_description.as_deref(),
            tags: &tags,
            status: status.as_str(),
            author_id: admin.user.id,
        };
        match Post::insert(pool, &new_post) {
            Ok(id) => break id,
            Err(e) if e.is_unique_on("posts.slug") && attempt + 1 < SLUG_RETRIES => {
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    };

    let post = Post::find_with_author(pool, id)?
        .ok_or_else(|| ApiError::Internal("created post not readable".to_string()))?;
    Ok((
        Status::Created,
        Json(json!({ "success": true, "message": "Post created successfully", "data": post })),
    ))
}

/// Assemble the SET clause for a partial update. Only fields present in
/// the patch land in the set; a present-but-blank optional field clears
/// its column. A changed title re-derives the slug against every row but
/// this one.
pub(crate) fn build_update(
    pool: &DbPool,
    current: &PostRow,
    patch: &PostPatch,
) -> Result<UpdateSet, ApiError> {
    let mut set = UpdateSet::default();

    if let Some(title) = patch.title.as_deref() {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::Validation("Title cannot be empty".to_string()));
        }
        set.push("title", title.to_string());
        if title != current.title {
            let slug = slugs::derive_unique(pool, title, Some(current.id))?;
            set.push("slug", slug);
        }
    }

    if let Some(content) = patch.content.as_deref() {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::Validation("Content cannot be empty".to_string()));
        }
        set.push("content", content.to_string());
    }

    if let Some(excerpt) = patch.excerpt.clone() {
        set.push("excerpt", blank_to_null(excerpt));
    }

    if let Some(image) = patch.featured_image.clone() {
        set.push("featured_image", blank_to_null(image));
    }

    if let Some(meta) = patch.meta_description.clone() {
        set.push("meta_description", blank_to_null(meta));
    }

    if let Some(tags) = patch.tags.as_ref() {
        let tags_json = tags
            .as_ref()
            .map(|list| serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string()));
        set.push("tags", tags_json);
    }

    if let Some(status) = patch.status.as_deref().filter(|s| !s.is_empty()) {
        set.push("status", parse_status(status)?.as_str());
    }

    if set.is_empty() {
        return Err(ApiError::NoFieldsToUpdate);
    }

    Ok(set)
}

#[put("/<id>", format = "json", data = "<body>")]
pub fn post_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    store: &State<Arc<dyn ImageStore>>,
    id: i64,
    body: Json<PostPatch>,
) -> Result<Json<Value>, ApiError> {
    let patch = body.into_inner();
    let current = Post::find_row(pool, id)?.ok_or_else(|| ApiError::not_found("Post"))?;

    // Outer Some means the patch touched featured_image; the old file is
    // only reclaimed once the new reference is durable.
    let new_image: Option<Option<String>> = patch.featured_image.clone().map(blank_to_null);

    let mut attempt = 0;
    loop {
        let set = build_update(pool, &current, &patch)?;
        match Post::update(pool, id, &set) {
            Ok(true) => break,
            Ok(false) => return Err(ApiError::not_found("Post")),
            Err(e) if e.is_unique_on("posts.slug") && attempt + 1 < SLUG_RETRIES => {
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(new_ref) = &new_image {
        uploads::reconcile(
            store.inner().as_ref(),
            current.featured_image.as_deref(),
            new_ref.as_deref(),
        );
    }

    let post = Post::find_with_author(pool, id)?.ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(json!({ "success": true, "message": "Post updated successfully", "data": post })))
}

#[delete("/<id>")]
pub fn post_delete(
    _admin: AdminUser,
    pool: &State<DbPool>,
    store: &State<Arc<dyn ImageStore>>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    let row = Post::find_row(pool, id)?.ok_or_else(|| ApiError::not_found("Post"))?;

    if !Post::delete(pool, id)? {
        return Err(ApiError::not_found("Post"));
    }

    // Row is gone; the file it referenced can follow.
    uploads::reconcile(store.inner().as_ref(), row.featured_image.as_deref(), None);

    Ok(Json(json!({ "success": true, "message": "Post deleted successfully" })))
}

// ── Images ─────────────────────────────────────────────

#[derive(FromForm)]
pub struct ImageUploadForm<'f> {
    pub image: Option<TempFile<'f>>,
}

#[post("/upload-image", data = "<form>")]
pub async fn image_upload(
    _admin: AdminUser,
    pool: &State<DbPool>,
    store: &State<Arc<dyn ImageStore>>,
    mut form: Form<ImageUploadForm<'_>>,
) -> Result<Json<Value>, ApiError> {
    let Some(file) = form.image.as_mut() else {
        return Err(ApiError::Validation("No image file provided".to_string()));
    };
    if file.len() == 0 {
        return Err(ApiError::Validation("No image file provided".to_string()));
    }

    let content_type = file
        .content_type()
        .cloned()
        .filter(|ct| ct.top() == "image")
        .ok_or_else(|| {
            ApiError::UnsupportedMediaType("Only image uploads are accepted".to_string())
        })?;

    let max_mb = match Setting::get_i64(pool, "uploads_max_mb") {
        m if m > 0 => m,
        _ => 10,
    };
    if file.len() > (max_mb as u64) * 1024 * 1024 {
        return Err(ApiError::PayloadTooLarge(format!(
            "Image exceeds the {} MiB upload limit",
            max_mb
        )));
    }

    let bytes = uploads::read_temp(file).await.map_err(ApiError::Internal)?;

    // Raster formats get their magic bytes checked against the declared
    // type; a renamed .exe does not become a JPEG by Content-Type alone.
    if uploads::is_raster(&content_type) && image::load_from_memory(&bytes).is_err() {
        return Err(ApiError::UnsupportedMediaType(
            "File content does not match its declared image type".to_string(),
        ));
    }

    let filename = uploads::stored_filename(&content_type, file.raw_name());
    store.save(&filename, &bytes).map_err(ApiError::Internal)?;

    Ok(Json(json!({
        "success": true,
        "message": "Image uploaded successfully",
        "data": {
            "url": store.url_for(&filename),
            "filename": filename,
            "size": bytes.len(),
        }
    })))
}

/// Serve a stored image; the content type comes from the extension picked
/// at upload time.
#[get("/images/<filename>")]
pub fn image_fetch(
    store: &State<Arc<dyn ImageStore>>,
    filename: &str,
) -> Result<(ContentType, Vec<u8>), ApiError> {
    if !uploads::safe_filename(filename) {
        return Err(ApiError::not_found("Image"));
    }
    let bytes = store.read(filename).ok_or_else(|| ApiError::not_found("Image"))?;
    let content_type = filename
        .rsplit('.')
        .next()
        .and_then(ContentType::from_extension)
        .unwrap_or(ContentType::Binary);
    Ok((content_type, bytes))
}

#[delete("/images/<filename>")]
pub fn image_delete(
    _admin: AdminUser,
    store: &State<Arc<dyn ImageStore>>,
    filename: &str,
) -> Result<Json<Value>, ApiError> {
    if !uploads::safe_filename(filename) {
        return Err(ApiError::not_found("Image"));
    }
    match store.remove(filename) {
        Ok(true) => Ok(Json(json!({ "success": true, "message": "Image deleted successfully" }))),
        Ok(false) => Err(ApiError::not_found("Image")),
        Err(e) => Err(ApiError::Internal(e)),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list_public,
        list_admin,
        detail_by_slug,
        detail_admin,
        post_create,
        post_update,
        post_delete,
        image_upload,
        image_fetch,
        image_delete,
    ]
}
