//! HTTP-shaped request and response values seen by the edge layer.
//!
//! The edge cache never interprets these beyond method, URL and status; they
//! are opaque snapshots that can be stored, replayed or returned as-is.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::RequestSignature;

/// What the requesting context intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Script,
    Style,
    Image,
    Font,
}

impl Destination {
    /// Scripts, styles, images and fonts are classified before any route table.
    pub fn is_static_asset(self) -> bool {
        matches!(self, Destination::Script | Destination::Style | Destination::Image | Destination::Font)
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "empty" => Ok(Destination::Empty),
            "document" => Ok(Destination::Document),
            "script" => Ok(Destination::Script),
            "style" => Ok(Destination::Style),
            "image" => Ok(Destination::Image),
            "font" => Ok(Destination::Font),
            other => Err(Error::InvalidInput(format!("unknown destination: {other}"))),
        }
    }
}

/// Request mode; only navigations receive the cached offline page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Navigate,
    #[default]
    Cors,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    pub method: Method,
    pub url: Url,
    /// Header list in the order the client sent it.
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub destination: Destination,
    pub mode: RequestMode,
}

impl EdgeRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: Vec::new(), body: None, destination: Destination::Empty, mode: RequestMode::Cors }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Mark this request as a top-level page navigation.
    pub fn navigate(mut self) -> Self {
        self.mode = RequestMode::Navigate;
        self.destination = Destination::Document;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn signature(&self) -> RequestSignature {
        RequestSignature::new(&self.method, &self.url)
    }
}

/// A fully buffered response.
///
/// A snapshot only exists once the whole body has been read, so anything
/// written to a cache container is always complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Synthetic response returned when a write was durably queued.
    pub fn queued() -> Self {
        Self::new(202, r#"{"queued":true}"#).with_header("content-type", "application/json")
    }

    /// Synthetic response returned when neither network nor cache can answer.
    pub fn offline() -> Self {
        Self::new(503, "Offline").with_header("content-type", "text/plain")
    }

    /// 2xx responses are the only ones written to a cache container.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup; returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Where the bytes of an [`EdgeResponse`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Offline,
    Queued,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
            ResponseSource::Queued => "queued",
        };
        f.write_str(s)
    }
}

/// Response handed back to the caller of the edge layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    pub snapshot: ResponseSnapshot,
    pub source: ResponseSource,
}

impl EdgeResponse {
    pub fn new(snapshot: ResponseSnapshot, source: ResponseSource) -> Self {
        Self { snapshot, source }
    }
}
