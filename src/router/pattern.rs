//! Route pattern compilation — turns an Express-style pattern string into a
//! sequence of [`Segment`]s the trie can insert and match against.

use thiserror::Error;

/// One compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal segment, matched byte-for-byte.
    Static(String),
    /// `:name` — captures exactly one path segment under `name`.
    Param(String),
    /// `*name` or bare `*` — captures the remainder of the path (bare `*`
    /// binds under the key `"*"`).
    Wildcard(String),
}

/// Errors raised while compiling a pattern string, surfaced to callers as
/// `invalid_pattern` at manifest build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern must start with '/'")]
    MissingLeadingSlash,
    #[error("empty path segment in pattern")]
    EmptySegment,
    #[error("wildcard segment must be the final segment")]
    WildcardNotLast,
    #[error("parameter name must not be empty")]
    EmptyParamName,
    #[error("':' or '*' is only meaningful at the start of a segment")]
    IllegalSegmentChar,
}

/// Compiles a pattern string into its segment sequence. The root pattern
/// `/` compiles to an empty segment list.
pub fn compile(pattern: &str) -> Result<Vec<Segment>, PatternError> {
    if !pattern.starts_with('/') {
        return Err(PatternError::MissingLeadingSlash);
    }

    let raw: Vec<&str> = pattern.split('/').skip(1).collect();
    if raw.len() == 1 && raw[0].is_empty() {
        return Ok(Vec::new());
    }

    let last = raw.len() - 1;
    let mut segments = Vec::with_capacity(raw.len());

    for (i, seg) in raw.iter().enumerate() {
        if seg.is_empty() {
            // A trailing slash (other than the root) is a significant,
            // distinct pattern — modeled as an empty static segment so
            // segment-count matching naturally tells `/a` and `/a/` apart.
            if i == last {
                segments.push(Segment::Static(String::new()));
                continue;
            }
            return Err(PatternError::EmptySegment);
        }

        if *seg == "*" {
            if i != last {
                return Err(PatternError::WildcardNotLast);
            }
            segments.push(Segment::Wildcard("*".to_string()));
        } else if let Some(name) = seg.strip_prefix('*') {
            if i != last {
                return Err(PatternError::WildcardNotLast);
            }
            if name.is_empty() {
                return Err(PatternError::EmptyParamName);
            }
            segments.push(Segment::Wildcard(name.to_string()));
        } else if let Some(name) = seg.strip_prefix(':') {
            if name.is_empty() {
                return Err(PatternError::EmptyParamName);
            }
            segments.push(Segment::Param(name.to_string()));
        } else {
            if seg.contains(':') || seg.contains('*') {
                return Err(PatternError::IllegalSegmentChar);
            }
            segments.push(Segment::Static((*seg).to_string()));
        }
    }

    Ok(segments)
}

pub fn has_params(segments: &[Segment]) -> bool {
    segments.iter().any(|s| matches!(s, Segment::Param(_)))
}

pub fn has_wildcard(segments: &[Segment]) -> bool {
    segments.iter().any(|s| matches!(s, Segment::Wildcard(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        assert_eq!(compile("/").unwrap(), Vec::new());
    }

    #[test]
    fn static_segments() {
        assert_eq!(
            compile("/users/profile").unwrap(),
            vec![
                Segment::Static("users".into()),
                Segment::Static("profile".into())
            ]
        );
    }

    #[test]
    fn param_segment() {
        assert_eq!(
            compile("/users/:id").unwrap(),
            vec![Segment::Static("users".into()), Segment::Param("id".into())]
        );
    }

    #[test]
    fn named_wildcard() {
        assert_eq!(
            compile("/files/*rest").unwrap(),
            vec![
                Segment::Static("files".into()),
                Segment::Wildcard("rest".into())
            ]
        );
    }

    #[test]
    fn bare_wildcard_binds_star_key() {
        assert_eq!(
            compile("/files/*").unwrap(),
            vec![
                Segment::Static("files".into()),
                Segment::Wildcard("*".into())
            ]
        );
    }

    #[test]
    fn trailing_slash_is_distinct_segment() {
        let a = compile("/users").unwrap();
        let b = compile("/users/").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert_eq!(compile("users"), Err(PatternError::MissingLeadingSlash));
    }

    #[test]
    fn rejects_double_slash() {
        assert_eq!(compile("/users//profile"), Err(PatternError::EmptySegment));
    }

    #[test]
    fn rejects_wildcard_not_last() {
        assert_eq!(
            compile("/files/*rest/more"),
            Err(PatternError::WildcardNotLast)
        );
    }

    #[test]
    fn rejects_empty_param_name() {
        assert_eq!(compile("/users/:"), Err(PatternError::EmptyParamName));
    }

    #[test]
    fn rejects_interior_colon() {
        assert_eq!(
            compile("/users/u:id"),
            Err(PatternError::IllegalSegmentChar)
        );
    }

    #[test]
    fn rejects_interior_star() {
        assert_eq!(compile("/a*b"), Err(PatternError::IllegalSegmentChar));
    }

    #[test]
    fn has_params_and_wildcard_detection() {
        let p = compile("/users/:id").unwrap();
        assert!(has_params(&p));
        assert!(!has_wildcard(&p));
        let w = compile("/files/*").unwrap();
        assert!(!has_params(&w));
        assert!(has_wildcard(&w));
    }
}
