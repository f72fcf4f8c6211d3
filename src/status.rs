//! HTTP status codes as a typed enum.
//!
//! Only the codes the pipeline and its route handlers produce are listed.
//! Use [`Status`] anywhere a status code is accepted: `Response::status()`,
//! `Response::builder().status()`, or as a bare handler return value.
//!
//! ```rust
//! use catmusic_server::{Response, Status};
//!
//! Response::status(Status::NoContent);
//!
//! Response::builder()
//!     .status(Status::Created)
//!     .header("location", "/api/getAlbum")
//!     .json(b"{}".to_vec());
//! ```

/// A known HTTP status code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Created,             // 201
    NoContent,           // 204

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    NotModified,         // 304

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    Forbidden,           // 403
    NotFound,            // 404
    MethodNotAllowed,    // 405

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
}

impl Status {
    /// Numeric code, e.g. `404`.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok                  => 200,
            Self::Created             => 201,
            Self::NoContent           => 204,
            Self::NotModified         => 304,
            Self::BadRequest          => 400,
            Self::Forbidden           => 403,
            Self::NotFound            => 404,
            Self::MethodNotAllowed    => 405,
            Self::InternalServerError => 500,
        }
    }

    /// Canonical reason phrase, e.g. `"Not Found"`.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                  => "OK",
            Self::Created             => "Created",
            Self::NoContent           => "No Content",
            Self::NotModified         => "Not Modified",
            Self::BadRequest          => "Bad Request",
            Self::Forbidden           => "Forbidden",
            Self::NotFound            => "Not Found",
            Self::MethodNotAllowed    => "Method Not Allowed",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.code()
    }
}

impl From<Status> for http::StatusCode {
    fn from(s: Status) -> http::StatusCode {
        // Every variant above is a registered code.
        http::StatusCode::from_u16(s.code()).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}
