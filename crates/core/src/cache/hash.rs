//! Deterministic hashing of URLs into storage names.

use sha2::{Digest, Sha256};

/// Compute the storage key (entry directory name) for a cached URL.
///
/// The URL is hashed exactly as given; no normalization happens here.
pub fn storage_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Compute the file name for a sub-resource, `<hash>` or `<hash>.<ext>`.
///
/// Extensions that are not short and alphanumeric are dropped so a hostile
/// URL can never steer the file outside its entry directory.
pub fn resource_file_name(original_url: &str, extension: Option<&str>) -> String {
    let hash = storage_key(original_url);
    match extension.map(|e| e.trim_start_matches('.')) {
        Some(ext) if is_safe_extension(ext) => format!("{hash}.{ext}"),
        _ => hash,
    }
}

fn is_safe_extension(ext: &str) -> bool {
    (1..=16).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
