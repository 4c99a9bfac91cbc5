use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::warn;
use rocket::fs::{FileName, TempFile};
use rocket::http::ContentType;

/// URL prefix that marks a featured-image reference as locally stored.
/// Anything else (an external URL, a CDN path) is never touched by the
/// cleanup below.
pub const IMAGE_URL_PREFIX: &str = "/posts/images/";

/// Storage behind the image endpoints. Disk in production; tests swap in
/// an in-memory implementation so the lifecycle rules can be checked
/// without real I/O.
pub trait ImageStore: Send + Sync {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<(), String>;
    fn exists(&self, filename: &str) -> bool;
    /// Ok(true) if a file was deleted, Ok(false) if it was already gone.
    fn remove(&self, filename: &str) -> Result<bool, String>;
    fn read(&self, filename: &str) -> Option<Vec<u8>>;
    /// Public URL a stored filename is served under.
    fn url_for(&self, filename: &str) -> String {
        format!("{}{}", IMAGE_URL_PREFIX, filename)
    }
}

/// Filenames are single path segments we generated ourselves; anything
/// trying to climb out of the uploads directory is rejected outright.
pub fn safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// `/posts/images/<file>` -> `<file>`; anything else is not ours.
pub fn local_filename(image_ref: &str) -> Option<&str> {
    image_ref
        .strip_prefix(IMAGE_URL_PREFIX)
        .filter(|f| safe_filename(f))
}

/// Drop the old locally-stored file once a post stops referencing it,
/// either because the reference changed or the post was deleted. External
/// URLs pass through untouched, and a file that is already gone is fine —
/// cleanup is idempotent. Failures are logged, not surfaced: the record
/// mutation has already committed by the time this runs.
pub fn reconcile(store: &dyn ImageStore, old_ref: Option<&str>, new_ref: Option<&str>) {
    let Some(old) = old_ref else { return };
    if new_ref == Some(old) {
        return;
    }
    let Some(filename) = local_filename(old) else { return };
    if let Err(e) = store.remove(filename) {
        warn!("image cleanup failed for {}: {}", filename, e);
    }
}

/// Declared types whose bytes we can cross-check before accepting. SVG and
/// other non-raster image types pass on the declared type alone.
pub fn is_raster(ct: &ContentType) -> bool {
    ct.top() == "image"
        && matches!(
            ct.sub().as_str(),
            "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff"
        )
}

/// Server-generated name for a stored upload: `<uuid>-<millis>.<ext>`.
/// The extension comes from the declared content type, falling back to the
/// client's filename; anything unusable becomes "img".
pub fn stored_filename(content_type: &ContentType, client_name: Option<&FileName>) -> String {
    let ext = content_type
        .extension()
        .map(|e| e.as_str().to_lowercase())
        .or_else(|| {
            client_name.and_then(|name| {
                let raw = name.dangerous_unsafe_unsanitized_raw().as_str();
                raw.rsplit('.').next().map(|e| e.to_lowercase())
            })
        })
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "img".to_string());
    format!(
        "{}-{}.{}",
        uuid::Uuid::new_v4(),
        chrono::Utc::now().timestamp_millis(),
        ext
    )
}

/// Pull an uploaded part's bytes out of Rocket's temporary storage. Small
/// uploads are memory-backed, so this stages through a real file first.
pub async fn read_temp(file: &mut TempFile<'_>) -> Result<Vec<u8>, String> {
    let staging = std::env::temp_dir().join(format!("upload-{}", uuid::Uuid::new_v4()));
    file.persist_to(&staging)
        .await
        .map_err(|e| format!("stage upload: {}", e))?;
    let bytes = fs::read(&staging).map_err(|e| format!("read upload: {}", e));
    let _ = fs::remove_file(&staging);
    bytes
}

// ── Disk implementation ────────────────────────────────

pub struct DiskImageStore {
    dir: PathBuf,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DiskImageStore { dir: dir.into() }
    }

    fn path_for(&self, filename: &str) -> Option<PathBuf> {
        if safe_filename(filename) {
            Some(self.dir.join(filename))
        } else {
            None
        }
    }
}

impl ImageStore for DiskImageStore {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<(), String> {
        let path = self
            .path_for(filename)
            .ok_or_else(|| format!("invalid filename: {}", filename))?;
        let _ = fs::create_dir_all(&self.dir);
        fs::write(&path, bytes).map_err(|e| format!("write {}: {}", path.display(), e))
    }

    fn exists(&self, filename: &str) -> bool {
        self.path_for(filename).map(|p| p.is_file()).unwrap_or(false)
    }

    fn remove(&self, filename: &str) -> Result<bool, String> {
        let Some(path) = self.path_for(filename) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(format!("remove {}: {}", path.display(), e)),
        }
    }

    fn read(&self, filename: &str) -> Option<Vec<u8>> {
        let path = self.path_for(filename)?;
        fs::read(path).ok()
    }
}

// ── In-memory implementation (tests) ───────────────────

#[cfg(test)]
pub struct MemImageStore {
    files: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemImageStore {
    pub fn new() -> Self {
        MemImageStore {
            files: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn insert(&self, filename: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(filename.to_string(), bytes.to_vec());
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[cfg(test)]
impl ImageStore for MemImageStore {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<(), String> {
        if !safe_filename(filename) {
            return Err(format!("invalid filename: {}", filename));
        }
        self.insert(filename, bytes);
        Ok(())
    }

    fn exists(&self, filename: &str) -> bool {
        self.files.lock().unwrap().contains_key(filename)
    }

    fn remove(&self, filename: &str) -> Result<bool, String> {
        Ok(self.files.lock().unwrap().remove(filename).is_some())
    }

    fn read(&self, filename: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(filename).cloned()
    }
}
