use std::sync::OnceLock;

use regex::Regex;

use crate::db::DbPool;
use crate::errors::ApiError;
use crate::models::post::Post;

/// How many times a write path re-derives after losing the slug race to a
/// concurrent insert before giving up with a conflict.
pub const SLUG_RETRIES: u32 = 3;

/// Matches a numeric collision suffix, applied to what remains of an
/// existing slug after the base is stripped.
fn suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-(\d+)$").expect("static pattern"))
}

/// Reduce a title to its URL form: lowercase, ASCII letters, digits and
/// hyphens only, single hyphens between words, none at the ends. Returns
/// None when nothing survives (a title of pure punctuation has no slug).
pub fn base_slug(title: &str) -> Option<String> {
    let mut hyphenated = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            hyphenated.push(c);
        } else if c.is_whitespace() {
            hyphenated.push('-');
        }
        // anything else is dropped, not transliterated
    }

    let mut slug = String::with_capacity(hyphenated.len());
    let mut prev = '\0';
    for c in hyphenated.chars() {
        if c == '-' && prev == '-' {
            continue;
        }
        slug.push(c);
        prev = c;
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

/// Pick the next free slug for `base` given every existing slug that starts
/// with it. Only an exact match or `base-<integer>` occupies the namespace;
/// "harvest-festival" does not collide with "harvest". An exact match counts
/// as suffix 0, and the result is `base-<max+1>` once anything matched.
pub fn resolve_collision(base: &str, existing: &[String]) -> String {
    let mut max_suffix: Option<u64> = None;

    for slug in existing {
        if slug == base {
            max_suffix = Some(max_suffix.unwrap_or(0));
        } else if let Some(rest) = slug.strip_prefix(base) {
            if let Some(caps) = suffix_re().captures(rest) {
                // A suffix with no representable successor cannot contest
                // the namespace; it is skipped like a non-numeric one.
                if let Ok(n) = caps[1].parse::<u64>() {
                    if n < u64::MAX {
                        max_suffix = Some(max_suffix.map_or(n, |m| m.max(n)));
                    }
                }
            }
        }
    }

    match max_suffix {
        None => base.to_string(),
        Some(m) => format!("{}-{}", base, m + 1),
    }
}

/// Derive a unique slug for `title` against the posts table. On update,
/// `exclude_id` keeps the record's own row out of the collision set so an
/// unchanged title round-trips to the same slug.
///
/// Uniqueness here is best-effort: a concurrent writer can still take the
/// candidate between this read and the insert, which the UNIQUE constraint
/// on posts.slug catches and the caller resolves by re-deriving.
pub fn derive_unique(
    pool: &DbPool,
    title: &str,
    exclude_id: Option<i64>,
) -> Result<String, ApiError> {
    let base = base_slug(title).ok_or_else(|| {
        ApiError::Validation("Title must contain at least one letter or digit".to_string())
    })?;
    let existing = Post::slugs_with_prefix(pool, &base, exclude_id)?;
    Ok(resolve_collision(&base, &existing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_slug_basic_titles() {
        assert_eq!(base_slug("Hello, World!").as_deref(), Some("hello-world"));
        assert_eq!(base_slug("Hello World").as_deref(), Some("hello-world"));
        assert_eq!(base_slug("  Annual   Report 2024  ").as_deref(), Some("annual-report-2024"));
        assert_eq!(base_slug("already-a-slug").as_deref(), Some("already-a-slug"));
    }

    #[test]
    fn base_slug_strips_rather_than_transliterates() {
        // é is dropped outright, not mapped to e
        assert_eq!(base_slug("Café").as_deref(), Some("caf"));
        assert_eq!(base_slug("100% Effort").as_deref(), Some("100-effort"));
    }

    #[test]
    fn base_slug_collapses_and_trims_hyphens() {
        assert_eq!(base_slug("a --- b").as_deref(), Some("a-b"));
        assert_eq!(base_slug("--edges--").as_deref(), Some("edges"));
        assert_eq!(base_slug("a\t\n b").as_deref(), Some("a-b"));
    }

    #[test]
    fn base_slug_empty_when_nothing_survives() {
        assert_eq!(base_slug("!!!"), None);
        assert_eq!(base_slug("???  ..."), None);
        assert_eq!(base_slug(""), None);
        // A bare hyphen trims away to nothing
        assert_eq!(base_slug("-"), None);
    }

    #[test]
    fn base_slug_output_is_always_well_formed() {
        let titles = [
            "Hello, World!",
            "  A  B  C  ",
            "Ümläuts & Emoji 🎉 everywhere",
            "--- weird --- spacing ---",
            "MiXeD CaSe 42",
        ];
        for title in titles {
            if let Some(slug) = base_slug(title) {
                assert!(!slug.starts_with('-') && !slug.ends_with('-'), "{:?}", slug);
                assert!(!slug.contains("--"), "{:?}", slug);
                assert!(
                    slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
                    "{:?}",
                    slug
                );
            }
        }
    }

    #[test]
    fn collision_resolution_counts_only_exact_and_suffixed() {
        // No matches: the base itself is free
        assert_eq!(resolve_collision("hello-world", &[]), "hello-world");

        // An exact match counts as suffix 0
        let existing = vec!["hello-world".to_string()];
        assert_eq!(resolve_collision("hello-world", &existing), "hello-world-1");

        // Prefix-only neighbors are not collisions
        let existing = vec!["harvest-festival".to_string()];
        assert_eq!(resolve_collision("harvest", &existing), "harvest");

        // Non-numeric suffixes don't count either
        let existing = vec!["hello-worldwide".to_string(), "hello-world-draft".to_string()];
        assert_eq!(resolve_collision("hello-world", &existing), "hello-world");
    }

    #[test]
    fn collision_suffixes_increase_strictly() {
        let mut existing: Vec<String> = Vec::new();
        let mut produced = Vec::new();
        for _ in 0..4 {
            let next = resolve_collision("post", &existing);
            existing.push(next.clone());
            produced.push(next);
        }
        assert_eq!(produced, vec!["post", "post-1", "post-2", "post-3"]);
    }

    #[test]
    fn collision_ignores_suffixes_with_no_successor() {
        // u64::MAX cannot be incremented; a slug carrying it is treated
        // like any other non-contesting neighbor
        let existing = vec!["a-18446744073709551615".to_string()];
        assert_eq!(resolve_collision("a", &existing), "a");

        let existing = vec![
            "a".to_string(),
            "a-2".to_string(),
            "a-18446744073709551615".to_string(),
        ];
        assert_eq!(resolve_collision("a", &existing), "a-3");
    }

    #[test]
    fn collision_skips_past_the_maximum_suffix() {
        // A gap below the maximum doesn't get reused
        let existing = vec!["a".to_string(), "a-5".to_string()];
        assert_eq!(resolve_collision("a", &existing), "a-6");

        // Suffixed rows without the unsuffixed base still collide
        let existing = vec!["a-2".to_string()];
        assert_eq!(resolve_collision("a", &existing), "a-3");
    }
}
