//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is a mutable builder: every pipeline stage writes into the
//! same value, so headers set by an early stage (CORS) survive whatever a
//! later stage or the error translator does to status and body.

use bytes::Bytes;
use http_body_util::Full;
use tracing::warn;

use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use catmusic_server::{Response, Status};
///
/// Response::json(br#"{"code":0}"#.to_vec());
/// Response::text("hello");
/// Response::status(Status::NoContent);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use catmusic_server::{ContentType, Response, Status};
///
/// Response::builder()
///     .status(Status::Created)
///     .header("location", "/api/getAlbum")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: u16,
}

impl Default for Response {
    fn default() -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: Status::Ok.into() }
    }
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::bytes_raw(ContentType::Json.as_str(), body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes_raw(ContentType::Text.as_str(), body.into().into_bytes())
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::bytes_raw(ContentType::Html.as_str(), body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self { status: code.into(), ..Self::default() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: Status::Ok.into() }
    }

    fn bytes_raw(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            body,
            headers: vec![("content-type".to_owned(), content_type.to_owned())],
            status: Status::Ok.into(),
        }
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup. Returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_status(&mut self, code: Status) {
        self.status = code.into();
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Replaces every existing value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.append_header(name, value);
    }

    /// Adds a value without touching existing ones (`set-cookie`, `vary`).
    pub fn append_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_ascii_lowercase(), value.to_owned()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Folds a route handler's response into the exchange response.
    ///
    /// Status and body come from `other`. A header `other` sets replaces all
    /// earlier values of that name; `set-cookie` accumulates instead.
    pub(crate) fn merge(&mut self, other: Response) {
        for (name, _) in &other.headers {
            if !name.eq_ignore_ascii_case("set-cookie") {
                self.remove_header(name);
            }
        }
        self.headers.extend(other.headers);
        self.status = other.status;
        self.body = other.body;
    }

    /// Converts into the hyper representation written to the wire.
    ///
    /// `content-length` is derived from the body by hyper unless a stage set
    /// it explicitly (HEAD responses do).
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            let parsed = (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(&value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        response
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish(ContentType::Json.as_str(), body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text.as_str(), body.into().into_bytes())
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), body)
    }

    /// Terminate with no body (e.g. `Status::NoContent`).
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Route handlers return `Result<impl IntoResponse, E>`; implement this on
/// your own types to return them directly.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`Status`] directly from a handler: `return Ok(Status::NotFound)`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

// ── Escaping ──────────────────────────────────────────────────────────────────

/// Escapes text for inclusion in an HTML body.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c    => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut res = Response::default();
        res.append_header("Content-Type", "application/json");
        res.set_header("content-type", "text/css");
        assert_eq!(res.headers().len(), 1);
        assert_eq!(res.header("CONTENT-TYPE"), Some("text/css"));
    }

    #[test]
    fn merge_keeps_unrelated_headers_and_accumulates_cookies() {
        let mut res = Response::default();
        res.set_header("access-control-allow-origin", "*");
        res.set_header("content-type", "application/json;charset=utf-8");
        res.append_header("set-cookie", "a=1");

        let handler = Response::builder()
            .status(Status::Created)
            .header("set-cookie", "b=2")
            .text("made");
        res.merge(handler);

        assert_eq!(res.status_code(), 201);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
        let cookies: Vec<_> = res.headers().iter().filter(|(k, _)| k == "set-cookie").collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(res.body(), b"made");
    }

    #[test]
    fn into_inner_skips_invalid_headers() {
        let mut res = Response::text("ok");
        res.append_header("x-bad", "line\nbreak");
        let inner = res.into_inner();
        assert_eq!(inner.status(), http::StatusCode::OK);
        assert!(inner.headers().get("x-bad").is_none());
        assert!(inner.headers().get("content-type").is_some());
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;",
        );
    }
}
