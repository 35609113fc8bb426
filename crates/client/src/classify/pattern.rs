//! Path patterns for the navigation route table.
//!
//! Syntax: literal segments, `:name` parameters matching exactly one
//! non-empty segment, and a trailing `*` matching zero or more segments.
//! A trailing slash on either side is ignored.

use std::fmt;

use waypost_core::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern such as `/dashboard/classes-v2/container/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if !raw.starts_with('/') {
            return Err(Error::InvalidInput(format!("route pattern must start with '/': {raw}")));
        }

        let parts = split_path(raw);
        let mut segments = Vec::with_capacity(parts.len());
        let mut wildcard = false;

        for (index, part) in parts.iter().enumerate() {
            if *part == "*" {
                if index + 1 != parts.len() {
                    return Err(Error::InvalidInput(format!("'*' must be the last segment: {raw}")));
                }
                wildcard = true;
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(Error::InvalidInput(format!("unnamed parameter in pattern: {raw}")));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal((*part).to_string()));
            }
        }

        Ok(Self { raw: raw.to_string(), segments, wildcard })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts = split_path(path);

        let length_ok =
            if self.wildcard { parts.len() >= self.segments.len() } else { parts.len() == self.segments.len() };
        if !length_ok {
            return false;
        }

        self.segments.iter().zip(&parts).all(|(segment, part)| match segment {
            Segment::Literal(literal) => literal == part,
            Segment::Param(_) => !part.is_empty(),
        })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a path into segments; `/` yields none.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() { Vec::new() } else { trimmed.split('/').collect() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = RoutePattern::parse("/dashboard/classes-v2").unwrap();
        assert!(pattern.matches("/dashboard/classes-v2"));
        assert!(pattern.matches("/dashboard/classes-v2/"));
        assert!(!pattern.matches("/dashboard/classes-v2/containers"));
        assert!(!pattern.matches("/dashboard"));
    }

    #[test]
    fn test_root_pattern() {
        let pattern = RoutePattern::parse("/").unwrap();
        assert!(pattern.matches("/"));
        assert!(!pattern.matches("/index.html"));
    }

    #[test]
    fn test_param_pattern() {
        let pattern = RoutePattern::parse("/dashboard/classes-v2/container/:id").unwrap();
        assert!(pattern.matches("/dashboard/classes-v2/container/123"));
        assert!(pattern.matches("/dashboard/classes-v2/container/abc"));
        assert!(!pattern.matches("/dashboard/classes-v2/container"));
        assert!(!pattern.matches("/dashboard/classes-v2/container/123/edit"));
        assert!(!pattern.matches("/dashboard/classes-v2/container//"));
    }

    #[test]
    fn test_wildcard_pattern() {
        let pattern = RoutePattern::parse("/dashboard/classes-v2/*").unwrap();
        assert!(pattern.matches("/dashboard/classes-v2"));
        assert!(pattern.matches("/dashboard/classes-v2/anything"));
        assert!(pattern.matches("/dashboard/classes-v2/deep/nested/path"));
        assert!(!pattern.matches("/dashboard/bookings"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(RoutePattern::parse("dashboard").is_err());
        assert!(RoutePattern::parse("/assets/*/logo.png").is_err());
        assert!(RoutePattern::parse("/container/:").is_err());
    }
}
