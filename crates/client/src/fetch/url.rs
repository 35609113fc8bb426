//! URL canonicalization and resolution against the backend origin.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so equal requests produce equal signatures.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve an intercepted request target against the backend origin.
///
/// Absolute URLs are canonicalized as-is; anything else is treated as a
/// path on `origin`.
pub fn resolve(origin: &url::Url, target: &str) -> Result<url::Url, UrlError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    if trimmed.contains("://") {
        return canonicalize(trimmed);
    }

    let mut joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    joined.set_fragment(None);
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> url::Url {
        url::Url::parse("https://app.example.com").unwrap()
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("app.example.com/api/v2/packages").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.path(), "/api/v2/packages");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://APP.EXAMPLE.COM/Dashboard").unwrap();
        assert_eq!(url.host_str(), Some("app.example.com"));
        assert_eq!(url.path(), "/Dashboard");
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://app.example.com/api/v2/bookings?page=2&sort=desc#latest").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("page=2&sort=desc"));
    }

    #[test]
    fn test_canonicalize_rejects_bad_input() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("file:///etc/passwd"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_path_against_origin() {
        let url = resolve(&origin(), "/dashboard/classes-v2/container/42").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/dashboard/classes-v2/container/42");
    }

    #[test]
    fn test_resolve_keeps_query_drops_fragment() {
        let url = resolve(&origin(), "/api/v2/containers?active=true#x").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/api/v2/containers?active=true");
    }

    #[test]
    fn test_resolve_absolute_target() {
        let url = resolve(&origin(), "https://CDN.example.com/fonts/inter.woff2").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/fonts/inter.woff2");
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), ""), Err(UrlError::Empty)));
    }
}
