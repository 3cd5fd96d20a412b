//! Per-request state handed to middleware and handlers.
//!
//! This module contains the core types for working with a request while it is being
//! dispatched:
//! - [`RequestContext`]: the request itself plus everything the router learned about it
//! - [`PathParams`]: values captured by `:name` and `*name` segments
//! - [`QueryParams`]: the parsed query string
//!
//! A context is created for exactly one request, owned by the task serving it, and dropped
//! once the response has been produced.

use crate::path;
use crate::response::ResponseWriter;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Uri};
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::hash_map::Iter;
use thiserror::Error;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

/// Everything a handler can see about the request it is serving, and the response it is
/// building.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    query: QueryParams,
    path_params: PathParams,
    response: ResponseWriter,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a context for a request.
    ///
    /// The request path is normalized and the query string is parsed right away; path
    /// parameters stay empty until the dispatcher resolves a route.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let path = path::normalize(uri.path());
        let query = uri.query().map(QueryParams::parse).unwrap_or_default();

        Self {
            method,
            uri,
            path,
            headers,
            body,
            query,
            path_params: PathParams::empty(),
            response: ResponseWriter::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Creates a context from a request whose body has already been read.
    pub fn from_request(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    /// Replaces the cancellation token, usually with one owned by the connection.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI exactly as received, query string included.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The normalized request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub(crate) fn set_path_params(&mut self, params: PathParams) {
        self.path_params = params;
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub(crate) fn into_response_writer(self) -> ResponseWriter {
        self.response
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true once the host has given up on this request.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Completes when the host gives up on this request.
    ///
    /// Long running handlers can `select!` on this future.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// Deserializes the query string into `T`.
    ///
    /// # Example
    /// ```
    /// # use bytes::Bytes;
    /// # use http::{HeaderMap, Method, Uri};
    /// # use micro_router::RequestContext;
    /// # use serde::Deserialize;
    /// #[derive(Deserialize)]
    /// struct Page {
    ///     offset: u32,
    ///     limit: u32,
    /// }
    ///
    /// let uri = Uri::from_static("/pets?offset=20&limit=10");
    /// let ctx = RequestContext::new(Method::GET, uri, HeaderMap::new(), Bytes::new());
    /// let page: Page = ctx.query_as().unwrap();
    /// assert_eq!((page.offset, page.limit), (20, 10));
    /// ```
    pub fn query_as<T>(&self) -> Result<T, ExtractError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let query = self.uri.query().unwrap_or_default();
        serde_qs::from_str::<T>(query).map_err(ExtractError::Query)
    }

    /// Deserializes a JSON request body into `T`.
    pub fn json<T>(&self) -> Result<T, ExtractError>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_slice::<T>(&self.body).map_err(ExtractError::Json)
    }

    /// Deserializes an `application/x-www-form-urlencoded` request body into `T`.
    pub fn form<T>(&self) -> Result<T, ExtractError>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_urlencoded::from_bytes::<T>(&self.body).map_err(ExtractError::Form)
    }

    /// The request body as text.
    pub fn text(&self) -> Result<&str, ExtractError> {
        std::str::from_utf8(&self.body).map_err(|_| ExtractError::NotUtf8)
    }
}

/// Errors raised while turning request data into typed values.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid query string: {0}")]
    Query(#[source] serde_qs::Error),
    #[error("invalid json body: {0}")]
    Json(#[source] serde_json::Error),
    #[error("invalid form body: {0}")]
    Form(#[source] serde_urlencoded::de::Error),
    #[error("request body is not utf8")]
    NotUtf8,
}

/// Values captured by the dynamic and wildcard segments of the resolved route.
///
/// For the route `/users/:id` and the request `/users/42`, `id` maps to `42`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: HashMap<String, String>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.values.get(key.as_ref()).map(String::as_str)
    }

    pub fn iter(&self) -> Params<'_> {
        Params { inner: self.values.iter() }
    }

    pub(crate) fn insert(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }
}

impl<'a> IntoIterator for &'a PathParams {
    type Item = (&'a str, &'a str);
    type IntoIter = Params<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The parsed query string of a request.
///
/// Values are percent-decoded. A key without `=` is present with an empty value, and when
/// a key repeats the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

impl QueryParams {
    /// Parses a raw query string, without its leading `?`.
    ///
    /// # Example
    /// ```
    /// use micro_router::QueryParams;
    ///
    /// let query = QueryParams::parse("x=1&flag&x=2&name=Ada%20L");
    /// assert_eq!(query.get("x"), Some("2"));
    /// assert_eq!(query.get("flag"), Some(""));
    /// assert_eq!(query.get("name"), Some("Ada L"));
    /// ```
    pub fn parse(query: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            // collecting keeps the last value for a repeated key
            Ok(pairs) => Self { values: pairs.into_iter().collect() },
            Err(e) => {
                warn!(cause = %e, query, "failed to parse query string");
                Self::default()
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.values.get(key.as_ref()).map(String::as_str)
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.values.contains_key(key.as_ref())
    }

    pub fn iter(&self) -> Params<'_> {
        Params { inner: self.values.iter() }
    }
}

impl<'a> IntoIterator for &'a QueryParams {
    type Item = (&'a str, &'a str);
    type IntoIter = Params<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the name/value pairs of [`PathParams`] or [`QueryParams`].
#[derive(Debug)]
pub struct Params<'a> {
    inner: Iter<'a, String, String>,
}

impl<'a> Iterator for Params<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
