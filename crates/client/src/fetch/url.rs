//! Validation of URLs submitted for caching.
//!
//! Unlike a canonicalizer this never rewrites the input: the cache key is the
//! caller's exact string, so the parsed form is only used to make requests.

/// Error type for page URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a page URL for fetching.
///
/// Rules:
/// 1. Empty or whitespace-only input is rejected
/// 2. The URL must be absolute
/// 3. Only `http` and `https` schemes are accepted
pub fn parse_page_url(input: &str) -> Result<url::Url, UrlError> {
    if input.trim().is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(input).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::InvalidUrl("missing host".to_string()));
    }

    Ok(parsed)
}
