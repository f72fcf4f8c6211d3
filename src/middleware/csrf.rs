//! Cookie-based CSRF tokens.
//!
//! Stateless double-submit scheme. Each client holds a random secret in the
//! `HttpOnly` cookie [`SECRET_COOKIE`]. A token is
//!
//! ```text
//! <salt>-<hex(blake3_keyed(server key, salt "-" secret))>
//! ```
//!
//! and is handed to scripts through the readable [`XSRF_COOKIE`]. A request
//! proves it came from a page that could read that cookie by echoing the
//! token back; [`CsrfKey::verify`] recomputes the hash from the secret cookie.
//! The server keeps no token store.

use std::fmt;

use cookie::{Cookie, SameSite};
use hex_simd::{AsOut, AsciiCase};
use rand::{Rng, distributions::Alphanumeric};
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::method::Method;
use crate::pipeline::{BoxFuture, Exchange, Next, Outcome, Stage};
use crate::request::Request;

/// Readable cookie carrying the issued token.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";
/// `HttpOnly` cookie carrying the per-client secret.
pub const SECRET_COOKIE: &str = "_csrf";

const SECRET_LEN: usize = 32;
const SALT_LEN: usize = 16;
const KEY_CONTEXT: &str = "catmusic-server 2024-06-01 csrf token key";

/// Where a submitted token may appear, checked in this order after the
/// headers: query parameter, then urlencoded form field.
const TOKEN_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];
const TOKEN_FIELD: &str = "_csrf";

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(Alphanumeric)
        .map(char::from)
        .take(len)
        .collect()
}

/// The server-wide key tokens are signed with.
#[derive(Clone)]
pub struct CsrfKey([u8; blake3::KEY_LEN]);

impl CsrfKey {
    /// Derives the key from a configured secret, so tokens survive restarts.
    pub fn derive(secret: &str) -> Self {
        Self(blake3::derive_key(KEY_CONTEXT, secret.as_bytes()))
    }

    /// A random key. Tokens issued with it die with the process.
    pub fn random() -> Self {
        let mut key = [0_u8; blake3::KEY_LEN];
        rand::thread_rng().fill(&mut key[..]);
        Self(key)
    }

    /// A fresh per-client secret.
    pub fn new_secret() -> String {
        random_alphanumeric(SECRET_LEN)
    }

    /// Issues a token bound to `secret`. Every call uses a new salt.
    pub fn issue(&self, secret: &str) -> String {
        let salt = random_alphanumeric(SALT_LEN);
        let hash = self.hash(&salt, secret);
        let hash = hex_simd::encode_to_string(hash.as_bytes(), AsciiCase::Lower);
        format!("{salt}-{hash}")
    }

    /// Checks `token` against `secret`. Constant-time in the hash comparison.
    #[must_use]
    pub fn verify(&self, secret: &str, token: &str) -> bool {
        let Some((salt, hash)) = token.split_once('-') else {
            return false;
        };
        if hash.len() / 2 != blake3::OUT_LEN {
            return false;
        }

        let mut decoded = [0_u8; blake3::OUT_LEN];
        if hex_simd::decode(hash.as_bytes(), decoded.as_mut().as_out()).is_err() {
            return false;
        }

        // `blake3::Hash` compares in constant time
        self.hash(salt, secret) == decoded
    }

    fn hash(&self, salt: &str, secret: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.0);
        hasher.update(salt.as_bytes());
        hasher.update(b"-");
        hasher.update(secret.as_bytes());
        hasher.finalize()
    }
}

impl fmt::Debug for CsrfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfKey(..)")
    }
}

/// The token issued for the current request, stored in the request
/// extensions so route handlers can embed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── Issuer ────────────────────────────────────────────────────────────────────

/// On `GET /` and `HEAD /`, sets a fresh [`XSRF_COOKIE`] (and a secret cookie if the
/// client has none yet).
#[derive(Clone, Debug)]
pub struct CsrfIssuer {
    key: CsrfKey,
}

impl CsrfIssuer {
    pub fn new(key: CsrfKey) -> Self {
        Self { key }
    }

    fn issue(&self, cx: &mut Exchange) {
        let secret = match cx.request.cookie(SECRET_COOKIE) {
            Some(secret) if !secret.is_empty() => secret.to_owned(),
            _ => {
                let secret = CsrfKey::new_secret();
                let cookie = Cookie::build((SECRET_COOKIE, secret.as_str()))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Strict)
                    .build();
                cx.response.append_header("set-cookie", &cookie.encoded().to_string());
                secret
            }
        };

        let token = self.key.issue(&secret);
        let cookie = Cookie::build((XSRF_COOKIE, token.as_str())).path("/").build();
        cx.response.append_header("set-cookie", &cookie.encoded().to_string());
        debug!("issued csrf token");

        cx.request.extensions_mut().insert(CsrfToken(token));
    }
}

impl Stage for CsrfIssuer {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        let method = cx.request.method();
        if matches!(method, Method::Get | Method::Head) && cx.request.path() == "/" {
            self.issue(cx);
        }
        next.run(cx)
    }
}

// ── Guard ─────────────────────────────────────────────────────────────────────

/// Rejects requests under a path prefix that do not echo a valid token.
///
/// Mounted only when CSRF protection is enabled in the configuration.
#[derive(Clone, Debug)]
pub struct CsrfGuard {
    key: CsrfKey,
    prefix: String,
    ignore_methods: Vec<Method>,
}

impl CsrfGuard {
    /// Guards paths starting with `prefix`, except for `ignore_methods`.
    pub fn new(key: CsrfKey, prefix: impl Into<String>, ignore_methods: Vec<Method>) -> Self {
        Self { key, prefix: prefix.into(), ignore_methods }
    }

    fn applies_to(&self, req: &Request) -> bool {
        req.path().starts_with(&self.prefix) && !self.ignore_methods.contains(&req.method())
    }

    fn check(&self, req: &Request) -> Result<(), RequestError> {
        let secret = req.cookie(SECRET_COOKIE).filter(|s| !s.is_empty());
        let token = submitted_token(req);

        match (secret, token) {
            (Some(secret), Some(token)) if self.key.verify(secret, &token) => Ok(()),
            (secret, token) => {
                warn!(
                    method = %req.method(),
                    path = %req.path(),
                    has_secret = secret.is_some(),
                    has_token = token.is_some(),
                    "rejected request with invalid csrf token"
                );
                Err(RequestError::BadCsrfToken)
            }
        }
    }
}

impl Stage for CsrfGuard {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        if self.applies_to(&cx.request) {
            if let Err(err) = self.check(&cx.request) {
                return Box::pin(async move { Err(err) });
            }
        }
        next.run(cx)
    }
}

/// The token a request submitted: header, then query, then form field.
fn submitted_token(req: &Request) -> Option<String> {
    TOKEN_HEADERS
        .iter()
        .find_map(|name| req.header(name))
        .map(str::to_owned)
        .or_else(|| req.query_param(TOKEN_FIELD))
        .or_else(|| form_field(req, TOKEN_FIELD))
}

fn form_field(req: &Request, name: &str) -> Option<String> {
    let content_type = req.header("content-type")?;
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return None;
    }
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(req.body()).ok()?;
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}
