//! Request signatures and their content-addressed storage keys.

use std::fmt;

use http::Method;
use sha2::{Digest, Sha256};
use url::Url;

/// Method plus normalized URL; identifies one cache record.
///
/// Normalization lowercases the host (done by the URL parser), removes the
/// fragment and keeps the query string untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature {
    method: String,
    url: String,
}

impl RequestSignature {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.as_str().to_ascii_uppercase(), url: url.into() }
    }

    /// Rebuild a signature from stored parts without renormalizing.
    pub(crate) fn from_parts(method: String, url: String) -> Self {
        Self { method, url }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Storage key: SHA-256 over method and URL.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Compute a content-addressed cache key for a request.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
