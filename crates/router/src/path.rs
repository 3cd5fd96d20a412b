//! Path normalization.
//!
//! Every path that enters the router, whether it comes from a route registration, a
//! middleware registration or an incoming request, goes through [`normalize`] first so
//! that all later comparisons can be plain string equality.

/// Canonicalizes a raw URL path.
///
/// - anything from the first `?` or `#` is dropped
/// - the result starts with exactly one `/`
/// - trailing `/` are stripped, the root path stays `/`
///
/// The function is idempotent: `normalize(&normalize(p)) == normalize(p)`.
///
/// # Example
/// ```
/// use micro_router::path::normalize;
///
/// assert_eq!(normalize("users/42/"), "/users/42");
/// assert_eq!(normalize("//files//"), "/files");
/// assert_eq!(normalize("/greet/Ada?x=1"), "/greet/Ada");
/// assert_eq!(normalize(""), "/");
/// ```
pub fn normalize(path: &str) -> String {
    let path = strip_query(path);
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');

    let mut normalized = String::with_capacity(trimmed.len() + 1);
    normalized.push('/');
    normalized.push_str(trimmed);
    normalized
}

/// Returns the part of `path` before any query string or fragment.
#[inline]
pub fn strip_query(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Splits a normalized path into its segments.
///
/// The leading `/` is not a separator, so the root path yields one empty segment.
#[inline]
pub fn segments(normalized: &str) -> std::str::Split<'_, char> {
    normalized.strip_prefix('/').unwrap_or(normalized).split('/')
}
