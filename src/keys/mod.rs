//! Key-path addressing for stored items.
//!
//! Profiles live at `/p-{slug}` and their links at `/p-{slug}/l-{id}`, so a
//! single prefix scan over a profile key returns the profile and all of its
//! links.

use unicode_normalization::UnicodeNormalization;

/// Key of the profile identified by `slug`.
pub fn profile_key(slug: &str) -> String {
    format!("/p-{}", slug)
}

/// Key of link `id` owned by the profile identified by `slug`.
pub fn link_key(slug: &str, id: u64) -> String {
    format!("{}/l-{}", profile_key(slug), id)
}

/// Turn a display name into a URL-safe slug.
///
/// The name is NFKD-decomposed first so accented letters keep their base
/// letter (`Zoë` becomes `zoe`). Keeps ASCII alphanumerics, `_` and `-`,
/// lowercases them, and collapses runs of whitespace and hyphens into a
/// single `-`. Everything else is dropped. The result may be empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.nfkd() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '-' || c.is_whitespace() {
            pending_dash = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}
