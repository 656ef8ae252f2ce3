//! Target platform naming constraints.
//!
//! The target accepts `[A-Za-z0-9 _.-]` up to 63 characters for general
//! objects and 31 for URL-category names, which must also start with a
//! letter. Offending characters are replaced with `_`; overlong names are
//! truncated and given a short suffix derived from the object's canonical
//! UID, so the same object always maps to the same target name and two
//! objects whose cleaned names collide after truncation still diverge.

use canon_store::Uid;
use sha2::{Digest, Sha256};

/// Maximum identifier length for general target objects.
pub const MAX_OBJECT_NAME: usize = 63;
/// Maximum identifier length for URL-category-style objects.
pub const MAX_URL_CATEGORY_NAME: usize = 31;

/// Hex characters appended when a name is truncated.
const SUFFIX_LEN: usize = 3;

fn allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-')
}

/// Replace every disallowed character with `_`. The result is pure ASCII.
fn sanitize(raw: &str) -> String {
    raw.chars().map(|c| if allowed(c) { c } else { '_' }).collect()
}

/// Deterministic disambiguator: leading hex of sha256 over the UID.
fn disambiguator(uid: &Uid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_str().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..SUFFIX_LEN].to_string()
}

fn bound(mut name: String, uid: &Uid, max: usize) -> String {
    if name.len() <= max {
        return name;
    }
    // Sanitized names are ASCII, so byte truncation is safe.
    name.truncate(max - SUFFIX_LEN - 1);
    format!("{name}_{}", disambiguator(uid))
}

/// Constrain a canonical name for use as a general target object name.
pub fn constrain_object_name(raw: &str, uid: &Uid) -> String {
    let cleaned = sanitize(raw);
    if cleaned.is_empty() {
        return format!("obj_{}", disambiguator(uid));
    }
    bound(cleaned, uid, MAX_OBJECT_NAME)
}

/// Constrain a canonical name for use as a target URL-category name.
///
/// Besides the tighter length bound, category names must start with a
/// letter; an `a` is prefixed when the cleaned name does not.
pub fn constrain_url_category_name(raw: &str, uid: &Uid) -> String {
    let cleaned = sanitize(raw);
    let prefixed = match cleaned.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => cleaned,
        _ => format!("a{cleaned}"),
    };
    bound(prefixed, uid, MAX_URL_CATEGORY_NAME)
}
