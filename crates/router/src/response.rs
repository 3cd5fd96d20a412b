//! The response façade handed to middleware and handlers.
//!
//! Handlers write their response into [`ResponseWriter`] instead of returning one, so that
//! middleware running before them can set headers and the handler can still decide the
//! status and body. The dispatcher turns the writer into an `http::Response` once the
//! handler returns.

use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderName, HeaderValue, InvalidHeaderValue};
use http::{HeaderMap, Response, StatusCode};
use serde::Serialize;

/// Headers every dispatched response starts with: permissive CORS and keep-alive hints.
pub fn default_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (header::CONNECTION, HeaderValue::from_static("Keep-Alive")),
        (HeaderName::from_static("keep-alive"), HeaderValue::from_static("timeout=5, max=997")),
    ]
}

/// An in-memory response under construction.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status set so far, `None` if nobody set one.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets every header from `headers`, then the status.
    pub fn set_headers<I, V>(&mut self, headers: I, status: StatusCode) -> Result<&mut Self, InvalidHeaderValue>
    where
        I: IntoIterator<Item = (HeaderName, V)>,
        V: TryInto<HeaderValue, Error = InvalidHeaderValue>,
    {
        for (name, value) in headers {
            self.headers.insert(name, value.try_into()?);
        }
        self.status = Some(status);
        Ok(self)
    }

    pub(crate) fn apply_default_headers(&mut self) {
        for (name, value) in default_headers() {
            self.headers.insert(name, value);
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Appends raw bytes to the body.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(bytes.as_ref());
        self
    }

    /// Replaces the body with plain text.
    pub fn text(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.replace_body(text.as_ref().as_bytes(), HeaderValue::from_static("text/plain; charset=utf-8"))
    }

    /// Replaces the body with an HTML document.
    pub fn html(&mut self, html: impl AsRef<str>) -> &mut Self {
        self.replace_body(html.as_ref().as_bytes(), HeaderValue::from_static("text/html; charset=utf-8"))
    }

    /// Replaces the body with `value` encoded as JSON.
    ///
    /// Nothing is written when encoding fails.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self.replace_body(&bytes, HeaderValue::from_static("application/json")))
    }

    /// Replaces the body with bytes of the given media type.
    pub fn bytes(&mut self, bytes: impl AsRef<[u8]>, content_type: &mime::Mime) -> Result<&mut Self, InvalidHeaderValue> {
        let content_type = HeaderValue::from_str(content_type.as_ref())?;
        Ok(self.replace_body(bytes.as_ref(), content_type))
    }

    /// Points the client somewhere else.
    pub fn redirect(&mut self, location: &str, status: StatusCode) -> Result<&mut Self, InvalidHeaderValue> {
        self.headers.insert(header::LOCATION, HeaderValue::from_str(location)?);
        self.status = Some(status);
        Ok(self)
    }

    fn replace_body(&mut self, bytes: &[u8], content_type: HeaderValue) -> &mut Self {
        self.body.clear();
        self.body.extend_from_slice(bytes);
        self.headers.insert(header::CONTENT_TYPE, content_type);
        self
    }

    /// Finishes the response. A response without a status goes out as `200 OK`.
    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}
