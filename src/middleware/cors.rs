//! Permissive CORS headers.

use crate::pipeline::{BoxFuture, Exchange, Next, Outcome, Stage};
use crate::response::Response;

const HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-headers", "Content-Type"),
    ("access-control-allow-methods", "*"),
    ("content-type", "application/json;charset=utf-8"),
];

/// Stamps the cross-origin headers, and a JSON default content type, on every
/// response before anything else runs.
///
/// Applies to every method and path. Later stages may override
/// `content-type`; the `access-control-*` headers survive errors because the
/// error translator writes onto the same response.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cors;

impl Cors {
    /// Writes the headers onto a response built outside the pipeline.
    pub(crate) fn apply(response: &mut Response) {
        for (name, value) in HEADERS {
            response.set_header(name, value);
        }
    }
}

impl Stage for Cors {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Self::apply(&mut cx.response);
        next.run(cx)
    }
}
