use std::convert::Infallible;
use std::fs;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use catmusic_server::middleware::CSRF_REJECTION_MESSAGE;
use catmusic_server::{App, Config, Request, RequestError, Response, Router};
use flate2::read::GzDecoder;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame};
use tempfile::TempDir;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn dist() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<!doctype html><div id=app></div>").unwrap();
    fs::write(dir.path().join("app.js"), "export const songs = [];\n".repeat(200)).unwrap();
    dir
}

fn config(dir: &TempDir) -> Config {
    Config { static_root: dir.path().to_path_buf(), ..Config::default() }
}

fn protected(dir: &TempDir, secret: Option<&str>) -> Config {
    let mut config = config(dir);
    config.csrf.protection = true;
    config.csrf.secret = secret.map(str::to_owned);
    config
}

async fn get_recommend(_req: Request) -> Result<Response, Infallible> {
    Ok(Response::json(br#"{"code":0,"result":{"sliders":[]}}"#.to_vec()))
}

async fn save_favorite(req: Request) -> Result<Response, Infallible> {
    Ok(Response::json(format!(r#"{{"code":0,"saved":{}}}"#, req.body().len()).into_bytes()))
}

async fn leaky(_req: Request) -> Result<Response, RequestError> {
    Err(RequestError::BadCsrfToken)
}

fn api() -> Router {
    Router::new()
        .get("/api/getRecommend", get_recommend)
        .post("/api/favorite", save_favorite)
        .get("/api/leaky", leaky)
}

fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> http::Request<Full<Bytes>> {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

fn with_utf8_cookie(
    mut req: http::Request<Full<Bytes>>,
    cookie: &str,
) -> http::Request<Full<Bytes>> {
    let value = http::HeaderValue::from_bytes(format!("{cookie}; nick=猫").as_bytes()).unwrap();
    req.headers_mut().insert("cookie", value);
    req
}

async fn body_of(res: http::Response<Full<Bytes>>) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// `name=value` of every `set-cookie` header.
fn set_cookies(res: &http::Response<Full<Bytes>>) -> Vec<String> {
    res.headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_owned())
        .collect()
}

fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies.iter().find_map(|c| c.strip_prefix(&prefix)).map(str::to_owned)
}

fn assert_cors(res: &http::Response<Full<Bytes>>) {
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["access-control-allow-headers"], "Content-Type");
    assert_eq!(res.headers()["access-control-allow-methods"], "*");
}

/// Visits `/` and returns the `Cookie` header and token a browser would echo.
async fn obtain_token(app: &App) -> (String, String) {
    let res = app.handle(request("GET", "/", &[])).await;
    let cookies = set_cookies(&res);
    let token = cookie_value(&cookies, "XSRF-TOKEN").unwrap();
    (cookies.join("; "), token)
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_serves_index_and_issues_token() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("GET", "/", &[])).await;

    assert_eq!(res.status(), 200);
    assert_cors(&res);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");

    let cookies = set_cookies(&res);
    let token = cookie_value(&cookies, "XSRF-TOKEN").unwrap();
    assert!(!token.is_empty());
    assert!(cookie_value(&cookies, "_csrf").is_some());

    let raw: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
    assert!(raw.iter().any(|v| v.to_str().unwrap().contains("HttpOnly")));

    assert_eq!(body_of(res).await, b"<!doctype html><div id=app></div>");
}

#[tokio::test]
async fn sequential_root_requests_issue_different_tokens() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let (_, first) = obtain_token(&app).await;
    let (_, second) = obtain_token(&app).await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn missing_file_is_a_plain_404() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("GET", "/nonexistent.file", &[])).await;

    assert_eq!(res.status(), 404);
    assert_cors(&res);
    let body = String::from_utf8(body_of(res).await).unwrap();
    assert!(body.contains("Cannot GET /nonexistent.file"));
    assert!(!body.contains(CSRF_REJECTION_MESSAGE));
}

#[tokio::test]
async fn csrf_error_from_a_handler_gets_the_guidance_page() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("GET", "/api/leaky", &[])).await;

    assert_eq!(res.status(), 403);
    assert_cors(&res);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    let body = String::from_utf8(body_of(res).await).unwrap();
    assert_eq!(body, format!("<p>{CSRF_REJECTION_MESSAGE}</p>"));
}

#[tokio::test]
async fn api_routes_answer_with_json() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("GET", "/api/getRecommend", &[])).await;

    assert_eq!(res.status(), 200);
    assert_cors(&res);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(body_of(res).await, br#"{"code":0,"result":{"sliders":[]}}"#);
}

#[tokio::test]
async fn static_assets_are_gzipped_on_request() {
    let dir = dist();
    let app = App::new(&config(&dir), api());
    let original = fs::read(dir.path().join("app.js")).unwrap();

    let accept = [("accept-encoding", "gzip, deflate, br")];
    let res = app.handle(request("GET", "/app.js", &accept)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-encoding"], "gzip");
    assert_eq!(res.headers()["vary"], "Accept-Encoding");

    let compressed = body_of(res).await;
    let mut decoded = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, original);

    let res = app.handle(request("GET", "/app.js", &[])).await;
    assert!(res.headers().get("content-encoding").is_none());
    assert_eq!(body_of(res).await, original);
}

#[tokio::test]
async fn traversal_is_forbidden() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("GET", "/%2e%2e/etc/passwd", &[])).await;
    assert_eq!(res.status(), 403);
    assert_cors(&res);
}

#[tokio::test]
async fn unknown_methods_are_not_allowed() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("BREW", "/", &[])).await;
    assert_eq!(res.status(), 405);
    assert_cors(&res);
}

#[tokio::test]
async fn options_falls_through_with_cors_headers() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let res = app.handle(request("OPTIONS", "/api/favorite", &[])).await;
    assert_eq!(res.status(), 404);
    assert_cors(&res);
}

struct BrokenBody;

impl Body for BrokenBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(Some(Err(std::io::Error::other("connection reset"))))
    }
}

#[tokio::test]
async fn unreadable_body_is_a_bad_request() {
    let dir = dist();
    let app = App::new(&config(&dir), api());

    let req = http::Request::builder()
        .method("POST")
        .uri("/api/favorite")
        .body(BrokenBody)
        .unwrap();
    let res = app.handle(req).await;

    assert_eq!(res.status(), 400);
    assert_cors(&res);
}

// ── CSRF protection enabled ───────────────────────────────────────────────────

#[tokio::test]
async fn protected_api_rejects_requests_without_a_token() {
    let dir = dist();
    let app = App::new(&protected(&dir, None), api());

    let res = app.handle(request("POST", "/api/favorite", &[])).await;

    assert_eq!(res.status(), 403);
    assert_cors(&res);
    let body = String::from_utf8(body_of(res).await).unwrap();
    assert!(body.contains(CSRF_REJECTION_MESSAGE));
}

#[tokio::test]
async fn protected_api_accepts_the_issued_token() {
    let dir = dist();
    let app = App::new(&protected(&dir, None), api());
    let (cookie, token) = obtain_token(&app).await;

    let res = app
        .handle(request(
            "POST",
            "/api/favorite",
            &[("cookie", cookie.as_str()), ("x-xsrf-token", token.as_str())],
        ))
        .await;

    assert_eq!(res.status(), 200);
    assert_eq!(body_of(res).await, br#"{"code":0,"saved":0}"#);
}

#[tokio::test]
async fn non_ascii_cookie_does_not_hide_the_secret() {
    let dir = dist();
    let app = App::new(&protected(&dir, None), api());
    let (cookie, token) = obtain_token(&app).await;

    let req = request("POST", "/api/favorite", &[("x-xsrf-token", token.as_str())]);
    let res = app.handle(with_utf8_cookie(req, &cookie)).await;
    assert_eq!(res.status(), 200);

    let res = app.handle(with_utf8_cookie(request("GET", "/", &[]), &cookie)).await;
    let cookies = set_cookies(&res);
    assert!(cookie_value(&cookies, "_csrf").is_none());
    assert!(cookie_value(&cookies, "XSRF-TOKEN").is_some());
}

#[tokio::test]
async fn protected_api_rejects_a_forged_token() {
    let dir = dist();
    let app = App::new(&protected(&dir, None), api());
    let (cookie, _) = obtain_token(&app).await;

    let res = app
        .handle(request(
            "POST",
            "/api/favorite",
            &[("cookie", cookie.as_str()), ("x-xsrf-token", "forged-0000")],
        ))
        .await;

    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn protection_covers_get_but_skips_head_options_and_other_paths() {
    let dir = dist();
    let app = App::new(&protected(&dir, None), api());

    let res = app.handle(request("GET", "/api/getRecommend", &[])).await;
    assert_eq!(res.status(), 403);

    let cases = [("HEAD", "/api/getRecommend"), ("OPTIONS", "/api/favorite"), ("GET", "/app.js")];
    for (method, path) in cases {
        let res = app.handle(request(method, path, &[])).await;
        assert_ne!(res.status(), 403, "{method} {path}");
    }
}

#[tokio::test]
async fn configured_secret_keeps_tokens_valid_across_restarts() {
    let dir = dist();
    let before = App::new(&protected(&dir, Some("catmusic")), api());
    let (cookie, token) = obtain_token(&before).await;

    let after = App::new(&protected(&dir, Some("catmusic")), api());
    let res = after
        .handle(request(
            "POST",
            "/api/favorite",
            &[("cookie", cookie.as_str()), ("csrf-token", token.as_str())],
        ))
        .await;
    assert_eq!(res.status(), 200);

    let rotated = App::new(&protected(&dir, Some("rotated")), api());
    let res = rotated
        .handle(request(
            "POST",
            "/api/favorite",
            &[("cookie", cookie.as_str()), ("csrf-token", token.as_str())],
        ))
        .await;
    assert_eq!(res.status(), 403);
}
