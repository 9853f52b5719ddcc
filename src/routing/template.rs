//! Path template parsing and matching.
//!
//! # Responsibilities
//! - Parse templates into literal, `{name}` and trailing `{*name}` segments
//! - Match request paths and extract named bindings
//! - Expose the literal-segment count used for resolution tie-breaks
//!
//! # Design Decisions
//! - Matching is segment-wise; no regex, O(n) in path length
//! - Trailing slashes are insignificant on both sides
//! - A wildcard binds one or more remaining segments, never zero

use crate::error::{ApiError, ApiResult};

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

/// A parsed path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    literal_count: usize,
}

impl PathTemplate {
    /// Parse a template such as `/users/{id}/files/{*rest}`.
    ///
    /// Rejected shapes: empty parameter names, duplicate parameter names,
    /// a wildcard anywhere but the last segment.
    pub fn parse(path: &str) -> ApiResult<Self> {
        let raw = normalize(path);
        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();
        let mut literal_count = 0;

        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if let Some(name) = inner.strip_prefix('*') {
                    if i != parts.len() - 1 {
                        return Err(ApiError::CompileError(format!(
                            "wildcard segment must be last in template {}",
                            raw
                        )));
                    }
                    check_name(name, &raw, &mut names)?;
                    Segment::Wildcard(name.to_string())
                } else {
                    check_name(inner, &raw, &mut names)?;
                    Segment::Param(inner.to_string())
                }
            } else {
                literal_count += 1;
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw,
            segments,
            literal_count,
        })
    }

    /// Match a request path, returning extracted bindings on success.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Vec::new();

        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                    i += 1;
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.push((name.clone(), (*value).to_string()));
                    i += 1;
                }
                Segment::Wildcard(name) => {
                    if i >= parts.len() {
                        return None;
                    }
                    params.push((name.clone(), parts[i..].join("/")));
                    i = parts.len();
                }
            }
        }

        if i == parts.len() {
            Some(params)
        } else {
            None
        }
    }

    /// The normalized template string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of literal (non-parameter) segments, used for tie-breaks.
    pub fn literal_count(&self) -> usize {
        self.literal_count
    }
}

fn check_name<'a>(name: &'a str, raw: &str, seen: &mut Vec<&'a str>) -> ApiResult<()> {
    if name.is_empty() {
        return Err(ApiError::CompileError(format!(
            "empty parameter name in template {}",
            raw
        )));
    }
    if seen.contains(&name) {
        return Err(ApiError::CompileError(format!(
            "duplicate parameter name {} in template {}",
            name, raw
        )));
    }
    seen.push(name);
    Ok(())
}

/// Normalize to a leading-slash, no-trailing-slash form.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let t = PathTemplate::parse("/users/list").unwrap();
        assert_eq!(t.literal_count(), 2);
        assert_eq!(t.matches("/users/list"), Some(vec![]));
        assert_eq!(t.matches("/users/list/"), Some(vec![]));
        assert!(t.matches("/users").is_none());
        assert!(t.matches("/users/list/extra").is_none());
    }

    #[test]
    fn test_param_binding() {
        let t = PathTemplate::parse("/users/{id}").unwrap();
        assert_eq!(t.literal_count(), 1);
        assert_eq!(
            t.matches("/users/42"),
            Some(vec![("id".to_string(), "42".to_string())])
        );
        assert!(t.matches("/users").is_none());
        assert!(t.matches("/users/42/files").is_none());
    }

    #[test]
    fn test_case_sensitive_literals() {
        let t = PathTemplate::parse("/Users/{id}").unwrap();
        assert!(t.matches("/users/1").is_none());
        assert!(t.matches("/Users/1").is_some());
    }

    #[test]
    fn test_wildcard_binds_remainder() {
        let t = PathTemplate::parse("/files/{*rest}").unwrap();
        assert_eq!(
            t.matches("/files/a/b/c"),
            Some(vec![("rest".to_string(), "a/b/c".to_string())])
        );
        assert_eq!(
            t.matches("/files/single"),
            Some(vec![("rest".to_string(), "single".to_string())])
        );
        // Wildcard requires at least one segment.
        assert!(t.matches("/files").is_none());
    }

    #[test]
    fn test_wildcard_must_be_last() {
        let err = PathTemplate::parse("/files/{*rest}/tail").unwrap_err();
        assert!(matches!(err, ApiError::CompileError(_)));
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let err = PathTemplate::parse("/a/{x}/b/{x}").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_param_rejected() {
        assert!(PathTemplate::parse("/a/{}").is_err());
        assert!(PathTemplate::parse("/a/{*}").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("users/list/"), "/users/list");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_root_template() {
        let t = PathTemplate::parse("/").unwrap();
        assert_eq!(t.matches("/"), Some(vec![]));
        assert!(t.matches("/anything").is_none());
    }

    #[test]
    fn test_mixed_template() {
        let t = PathTemplate::parse("/api/{version}/users/{id}").unwrap();
        assert_eq!(t.literal_count(), 2);
        let params = t.matches("/api/v2/users/7").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], ("version".to_string(), "v2".to_string()));
        assert_eq!(params[1], ("id".to_string(), "7".to_string()));
    }
}
