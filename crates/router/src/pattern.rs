//! Route pattern compilation and matching.
//!
//! A route path such as `/users/:id/files/*path` is compiled once, at registration
//! time, into a [`RoutePattern`]: an ordered list of typed [`Segment`]s. Matching walks
//! the pattern and the request path side by side, one segment at a time.
//!
//! # Syntax
//!
//! | token      | kind     | matches                                        |
//! |------------|----------|------------------------------------------------|
//! | `users`    | static   | exactly `users`                                |
//! | `:id`      | dynamic  | exactly one non-empty segment, captured as `id` |
//! | `*path`    | wildcard | zero or more segments, captured as `path`      |
//! | `*`        | wildcard | zero or more segments, captured nowhere        |
//!
//! # Example
//! ```
//! use micro_router::pattern::RoutePattern;
//!
//! let pattern = RoutePattern::parse("/files/*filepath").unwrap();
//! let params = pattern.matches("/files/movies/comedy/2012/x.mp4").unwrap();
//! assert_eq!(params.get("filepath"), Some("/movies/comedy/2012/x.mp4"));
//!
//! assert!(pattern.matches("/other").is_none());
//! ```

use crate::PathParams;
use crate::path;
use std::fmt;
use thiserror::Error;

/// The kind of one compiled path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Static,
    Dynamic,
    Wildcard,
}

/// One component of a compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    raw: String,
    kind: SegmentKind,
    name: String,
}

/// Errors found while compiling a route path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("dynamic segment `{token}` has no parameter name")]
    EmptyParamName { token: String },
}

impl Segment {
    /// Classifies a single path token.
    pub fn parse(token: &str) -> Result<Self, PatternError> {
        if let Some(name) = token.strip_prefix(':') {
            if name.is_empty() {
                return Err(PatternError::EmptyParamName { token: token.to_owned() });
            }
            return Ok(Self { raw: token.to_owned(), kind: SegmentKind::Dynamic, name: name.to_owned() });
        }

        if let Some(name) = token.strip_prefix('*') {
            return Ok(Self { raw: token.to_owned(), kind: SegmentKind::Wildcard, name: name.to_owned() });
        }

        Ok(Self { raw: token.to_owned(), kind: SegmentKind::Static, name: token.to_owned() })
    }

    /// The token as written in the route path, e.g. `:id`
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// The parameter name, without its `:` or `*` prefix.
    ///
    /// Empty for an anonymous wildcard; the literal text for a static segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn is_capturing(&self) -> bool {
        self.kind != SegmentKind::Static && !self.name.is_empty()
    }
}

/// A compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compiles a route path.
    ///
    /// The path is normalized first, so `users/:id/` and `/users/:id` compile to the same
    /// pattern. Compilation never looks at other routes: two patterns that can match the
    /// same request are only told apart at dispatch time, by registration order.
    pub fn parse(route: &str) -> Result<Self, PatternError> {
        let normalized = path::normalize(route);
        let segments = path::segments(&normalized).map(Segment::parse).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true when every segment is static.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|segment| segment.kind == SegmentKind::Static)
    }

    /// Returns true when any segment is a wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|segment| segment.kind == SegmentKind::Wildcard)
    }

    /// Matches a request path against this pattern.
    ///
    /// `path` is normalized before matching. Returns the captured parameters on a match
    /// and `None` otherwise; a miss is an ordinary outcome, not an error.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        self.matches_normalized(&path::normalize(path))
    }

    /// Same as [`RoutePattern::matches`] for a path that is already normalized.
    pub(crate) fn matches_normalized(&self, path: &str) -> Option<PathParams> {
        let url = path::segments(path).collect::<Vec<_>>();
        let mut params = PathParams::empty();

        // i walks the url, j walks the pattern
        let mut i = 0;
        for (j, segment) in self.segments.iter().enumerate() {
            match segment.kind {
                SegmentKind::Static => {
                    if url.get(i).is_none_or(|part| *part != segment.raw) {
                        return None;
                    }
                    i += 1;
                }
                SegmentKind::Dynamic => match url.get(i) {
                    Some(part) if !part.is_empty() => {
                        params.insert(segment.name.clone(), (*part).to_owned());
                        i += 1;
                    }
                    _ => return None,
                },
                SegmentKind::Wildcard => {
                    // an interior wildcard stops right before the next static segment, if
                    // that segment shows up at all; otherwise it swallows the rest
                    let end = self
                        .segments
                        .get(j + 1)
                        .filter(|next| next.kind == SegmentKind::Static)
                        .and_then(|next| url[i..].iter().position(|part| *part == next.raw))
                        .map_or(url.len(), |offset| i + offset);

                    if segment.is_capturing() {
                        params.insert(segment.name.clone(), join_captured(&url[i..end]));
                    }
                    i = end;
                }
            }
        }

        (i == url.len()).then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.raw)?;
        }
        Ok(())
    }
}

/// Joins captured url segments back into a path that starts with `/`, or "" when nothing
/// was captured.
fn join_captured(parts: &[&str]) -> String {
    let joined = parts.join("/");
    if joined.is_empty() || joined.starts_with('/') { joined } else { format!("/{joined}") }
}
