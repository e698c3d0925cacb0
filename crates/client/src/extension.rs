//! File extension inference for stored sub-resources.
//!
//! Resolution order: the URL path's own extension, then the Content-Type the
//! GET already returned, then a HEAD lookup. If all three fail the resource is
//! stored without an extension.

use url::Url;

const MAX_EXTENSION_LEN: usize = 8;

/// Looks up a resource's Content-Type without downloading it.
#[async_trait::async_trait]
pub trait ContentTypeLookup: Send + Sync {
    async fn lookup_content_type(&self, url: &Url) -> Option<String>;
}

/// Lookup that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

#[async_trait::async_trait]
impl ContentTypeLookup for NoLookup {
    async fn lookup_content_type(&self, _url: &Url) -> Option<String> {
        None
    }
}

/// Pick an extension for the resource at `url`, without a leading dot.
pub async fn resolve_extension(
    url: &Url, content_type_hint: Option<&str>, lookup: &dyn ContentTypeLookup,
) -> Option<String> {
    if let Some(ext) = extension_from_path(url) {
        return Some(ext);
    }

    if let Some(ext) = content_type_hint.and_then(extension_from_content_type) {
        return Some(ext);
    }

    let found = lookup.lookup_content_type(url).await?;
    let ext = extension_from_content_type(&found);
    if ext.is_none() {
        tracing::debug!("no extension known for {} ({})", url, found);
    }
    ext
}

/// Extension of the last path segment, lowercased.
pub fn extension_from_path(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;

    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(ext.to_ascii_lowercase())
}

/// Preferred extension for a Content-Type value. Parameters are ignored.
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }

    // mime_guess lists candidates alphabetically, so pin the common ones.
    let preferred = match essence.as_str() {
        "text/html" => Some("html"),
        "text/css" => Some("css"),
        "text/javascript" | "application/javascript" | "application/x-javascript" => Some("js"),
        "image/jpeg" => Some("jpg"),
        "image/svg+xml" => Some("svg"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        "font/woff2" => Some("woff2"),
        "application/json" => Some("json"),
        _ => None,
    };

    preferred
        .or_else(|| mime_guess::get_mime_extensions_str(&essence).and_then(|exts| exts.first().copied()))
        .map(str::to_string)
}
