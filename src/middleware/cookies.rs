//! `Cookie` header parsing.

use std::collections::HashMap;

use cookie::Cookie;

use crate::pipeline::{BoxFuture, Exchange, Next, Outcome, Stage};

/// Decoded request cookies, stored in the request extensions by
/// [`CookieParser`]. Read them with [`Request::cookie`](crate::Request::cookie).
#[derive(Clone, Debug, Default)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parses every `Cookie` header value.
    ///
    /// Values are percent-decoded and stripped of surrounding quotes. Pairs
    /// that fail to parse are dropped; when a name repeats, the first value
    /// wins.
    pub fn parse<'h>(headers: impl IntoIterator<Item = &'h str>) -> Self {
        let mut cookies = HashMap::new();
        for header in headers {
            for cookie in Cookie::split_parse_encoded(header) {
                let Ok(cookie) = cookie else {
                    continue;
                };

                cookies
                    .entry(cookie.name().to_owned())
                    .or_insert_with(|| cookie.value_trimmed().to_owned());
            }
        }
        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Populates the [`Cookies`] extension. Never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieParser;

impl Stage for CookieParser {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        let cookies = Cookies::parse(cx.request.header_values("cookie"));
        cx.request.extensions_mut().insert(cookies);
        next.run(cx)
    }
}
