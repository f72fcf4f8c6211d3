//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::Extensions;

use crate::method::Method;
use crate::middleware::Cookies;

/// An incoming HTTP request, owned by the pipeline for one exchange.
///
/// Stages publish per-request data through [`extensions`](Request::extensions):
/// the cookie parser stores a [`Cookies`] map there, the CSRF issuer a
/// [`CsrfToken`](crate::middleware::CsrfToken).
#[derive(Debug, Default)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) extensions: Extensions,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: &http::Uri,
        headers: &http::HeaderMap,
        body: Bytes,
    ) -> Self {
        // Opaque bytes outside visible ASCII are decoded lossily, never dropped.
        let headers = headers
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_owned(), value)
            })
            .collect();

        Self {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            headers,
            body,
            params: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Case-insensitive header lookup. Returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated header, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/api/album/{id}`, `req.param("id")` on `/api/album/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a decoded query-string parameter. The first occurrence wins.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(self.query()?).ok()?;
        pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a cookie value decoded by the cookie-parsing stage.
    ///
    /// `None` if the cookie is absent or the stage has not run.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.extensions.get::<Cookies>()?.get(name)
    }
}

#[cfg(test)]
impl Request {
    /// Test fixture: a request with the given method, URI and headers.
    pub(crate) fn fixture(method: Method, uri: &str, headers: &[(&str, &str)]) -> Self {
        let uri: http::Uri = uri.parse().expect("valid test uri");
        let mut map = http::HeaderMap::new();
        for (name, value) in headers {
            map.append(
                http::HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
                http::HeaderValue::from_str(value).expect("valid header value"),
            );
        }
        Self::new(method, &uri, &map, Bytes::new())
    }
}
