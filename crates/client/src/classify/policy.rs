//! Cache policies and the strategies they select.

use std::fmt;
use std::str::FromStr;

use http::Method;
use serde::{Deserialize, Serialize};
use waypost_core::{CacheKind, Error};

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkOnly => "network-only",
        }
    }

    /// Whether this strategy reads from or writes to a container.
    pub fn uses_cache(self) -> bool {
        !matches!(self, Strategy::NetworkOnly)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache-first" => Ok(Strategy::CacheFirst),
            "network-first" => Ok(Strategy::NetworkFirst),
            "stale-while-revalidate" => Ok(Strategy::StaleWhileRevalidate),
            "network-only" => Ok(Strategy::NetworkOnly),
            other => Err(Error::InvalidInput(format!("unknown strategy: {other}"))),
        }
    }
}

/// The outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Pattern or table key that produced this policy.
    pub pattern: String,
    pub method: Option<Method>,
    pub strategy: Strategy,
    pub kind: CacheKind,
    /// Freshness hint; advisory only.
    pub max_age_seconds: u64,
    /// Fetched into the static container at install.
    pub precache: bool,
}

impl CachePolicy {
    pub fn new(pattern: impl Into<String>, strategy: Strategy, kind: CacheKind, max_age_seconds: u64) -> Self {
        Self { pattern: pattern.into(), method: None, strategy, kind, max_age_seconds, precache: false }
    }

    pub fn for_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn precached(mut self) -> Self {
        self.precache = true;
        self
    }

    /// Writes are never cached.
    pub(crate) fn downgrade_to_network_only(mut self) -> Self {
        self.strategy = Strategy::NetworkOnly;
        self.max_age_seconds = 0;
        self
    }
}
