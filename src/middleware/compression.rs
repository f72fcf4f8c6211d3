//! Response body compression.

use std::io::Write;

use flate2::write::{DeflateEncoder, GzEncoder};
use tracing::{trace, warn};

use crate::method::Method;
use crate::pipeline::{BoxFuture, Exchange, Next, Outcome, Stage};
use crate::request::Request;
use crate::response::Response;

/// Bodies smaller than this are sent as is.
pub const DEFAULT_THRESHOLD: usize = 1024;

/// Content codings this stage can produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip    => "gzip",
            Self::Deflate => "deflate",
        }
    }

    /// Picks a coding from an `Accept-Encoding` value.
    ///
    /// q-values are honoured and `q=0` refuses a coding; `*` stands in for
    /// codings not listed. gzip wins ties.
    pub fn negotiate(accept_encoding: &str) -> Option<Self> {
        let mut gzip = None;
        let mut deflate = None;
        let mut any = None;

        for entry in accept_encoding.split(',') {
            let mut parts = entry.split(';');
            let coding = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let quality = parts
                .find_map(|p| {
                    let (name, value) = p.split_once('=')?;
                    name.trim().eq_ignore_ascii_case("q").then_some(value)
                })
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            match coding.as_str() {
                "gzip" | "x-gzip" => gzip = Some(quality),
                "deflate"         => deflate = Some(quality),
                "*"               => any = Some(quality),
                _ => {}
            }
        }

        let gzip = gzip.or(any).unwrap_or(0.0);
        let deflate = deflate.or(any).unwrap_or(0.0);
        if gzip > 0.0 && gzip >= deflate {
            Some(Self::Gzip)
        } else if deflate > 0.0 {
            Some(Self::Deflate)
        } else {
            None
        }
    }

    fn encode(self, body: &[u8]) -> std::io::Result<Vec<u8>> {
        let level = flate2::Compression::default();
        match self {
            Self::Gzip => {
                let mut e = GzEncoder::new(Vec::new(), level);
                e.write_all(body)?;
                e.finish()
            }
            Self::Deflate => {
                let mut e = DeflateEncoder::new(Vec::new(), level);
                e.write_all(body)?;
                e.finish()
            }
        }
    }
}

/// Compresses eligible responses produced by later stages.
///
/// A response is compressed when its content type is textual, its body is at
/// least `threshold` bytes, it has no `content-encoding` yet, it does not
/// carry `cache-control: no-transform`, it is not a `HEAD`/204/304 response,
/// and the client accepts gzip or deflate. Compressible responses always get
/// `vary: Accept-Encoding`.
#[derive(Clone, Debug)]
pub struct Compression {
    threshold: usize,
}

impl Compression {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    fn apply(&self, req: &Request, res: &mut Response) {
        if matches!(res.status_code(), 204 | 304) {
            return;
        }
        if !res.header("content-type").is_some_and(is_compressible) {
            return;
        }
        add_vary(res);

        if res.body().len() < self.threshold
            || req.method() == Method::Head
            || res.header("content-encoding").is_some()
            || res.header("cache-control").is_some_and(|v| v.contains("no-transform"))
        {
            return;
        }

        let Some(encoding) = req.header("accept-encoding").and_then(Encoding::negotiate) else {
            return;
        };

        match encoding.encode(res.body()) {
            Ok(compressed) => {
                trace!(
                    encoding = encoding.as_str(),
                    before = res.body().len(),
                    after = compressed.len(),
                    "compressed response body"
                );
                res.set_body(compressed);
                res.set_header("content-encoding", encoding.as_str());
            }
            Err(e) => warn!(encoding = encoding.as_str(), "compression failed: {e}"),
        }
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Stage for Compression {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            next.run(&mut *cx).await?;
            self.apply(&cx.request, &mut cx.response);
            Ok(())
        })
    }
}

fn is_compressible(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || essence.ends_with("/json")
        || essence.ends_with("+json")
        || essence.ends_with("/xml")
        || essence.ends_with("+xml")
        || essence == "application/javascript"
}

fn add_vary(res: &mut Response) {
    let already = res.headers().iter()
        .filter(|(k, _)| k == "vary")
        .flat_map(|(_, v)| v.split(','))
        .any(|v| {
            let v = v.trim();
            v == "*" || v.eq_ignore_ascii_case("accept-encoding")
        });
    if !already {
        res.append_header("vary", "Accept-Encoding");
    }
}
