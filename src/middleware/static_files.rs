//! Static asset fallback for the front-end build directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::fs;
use tracing::debug;

use crate::error::RequestError;
use crate::method::Method;
use crate::pipeline::{BoxFuture, Exchange, Next, Outcome, Stage};
use crate::request::Request;
use crate::response::{ContentType, Response, escape_html};
use crate::status::Status;

const INDEX: &str = "index.html";

/// Serves files below `root` and answers everything else with a 404 page.
///
/// Terminal: the stage never calls `next`.
#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn serve(&self, req: &Request, res: &mut Response) -> Result<(), RequestError> {
        let method = req.method();
        if !matches!(method, Method::Get | Method::Head) {
            not_found(req, res);
            return Ok(());
        }

        let mut path = match resolve(&self.root, req.path()) {
            Ok(path) => path,
            Err(Status::NotFound) => {
                not_found(req, res);
                return Ok(());
            }
            Err(status) => {
                refuse(res, status);
                return Ok(());
            }
        };

        let mut metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if is_missing(&e) => {
                not_found(req, res);
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                refuse(res, Status::Forbidden);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            path.push(INDEX);
            metadata = match fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) if is_missing(&e) => {
                    not_found(req, res);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
        }
        if !metadata.is_file() {
            not_found(req, res);
            return Ok(());
        }

        let modified = metadata.modified().ok().map(whole_seconds);

        res.set_header("content-type", &content_type(&path));
        res.set_header("cache-control", "public, max-age=0");
        if let Some(modified) = modified {
            res.set_header("last-modified", &httpdate::fmt_http_date(modified));
        }

        if let (Some(modified), Some(since)) = (modified, if_modified_since(req)) {
            if modified <= since {
                debug!(path = %path.display(), "not modified");
                res.set_status(Status::NotModified);
                res.remove_header("content-type");
                res.set_body(Vec::new());
                return Ok(());
            }
        }

        res.set_status(Status::Ok);
        if method == Method::Head {
            res.set_header("content-length", &metadata.len().to_string());
            res.set_body(Vec::new());
            return Ok(());
        }

        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if is_missing(&e) => {
                not_found(req, res);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), bytes = body.len(), "serving static file");
        res.set_body(body);
        Ok(())
    }
}

impl Stage for StaticFiles {
    fn call<'a>(&'a self, cx: &'a mut Exchange, _next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { self.serve(&cx.request, &mut cx.response).await })
    }
}

/// Maps a request path onto a file path below `root`.
///
/// Fails with the status to answer: 400 for undecodable paths or NUL bytes,
/// 403 for `..` segments, 404 for dotfiles.
fn resolve(root: &Path, request_path: &str) -> Result<PathBuf, Status> {
    let decoded = urlencoding::decode(request_path).map_err(|_| Status::BadRequest)?;
    if decoded.contains('\0') {
        return Err(Status::BadRequest);
    }

    let mut path = root.to_path_buf();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(Status::Forbidden),
            s if s.starts_with('.') => return Err(Status::NotFound),
            s => path.push(s),
        }
    }
    Ok(path)
}

fn content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let textual = mime.type_() == mime_guess::mime::TEXT
        || mime.subtype() == mime_guess::mime::JAVASCRIPT
        || mime.subtype() == mime_guess::mime::JSON;
    if textual && mime.get_param(mime_guess::mime::CHARSET).is_none() {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

fn if_modified_since(req: &Request) -> Option<SystemTime> {
    httpdate::parse_http_date(req.header("if-modified-since")?).ok()
}

// HTTP dates carry no sub-second part.
fn whole_seconds(t: SystemTime) -> SystemTime {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => UNIX_EPOCH + Duration::from_secs(d.as_secs()),
        Err(_) => t,
    }
}

fn is_missing(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn not_found(req: &Request, res: &mut Response) {
    let message = format!("Cannot {} {}", req.method(), req.path());
    let page = format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head>\n",
            "<meta charset=\"utf-8\">\n",
            "<title>Error</title>\n",
            "</head>\n",
            "<body>\n",
            "<pre>{}</pre>\n",
            "</body>\n",
            "</html>\n",
        ),
        escape_html(&message),
    );
    write_error_page(res, Status::NotFound, page);
}

fn refuse(res: &mut Response, status: Status) {
    write_error_page(res, status, format!("<pre>{}</pre>", status.reason()));
}

fn write_error_page(res: &mut Response, status: Status, page: String) {
    res.set_status(status);
    res.set_header("content-type", ContentType::Html.as_str());
    res.set_header("content-security-policy", "default-src 'none'");
    res.set_header("x-content-type-options", "nosniff");
    res.remove_header("last-modified");
    res.remove_header("cache-control");
    res.set_body(page.into_bytes());
}
