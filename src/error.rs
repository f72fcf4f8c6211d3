//! Error types.
//!
//! Two layers:
//!
//! - [`Error`] surfaces infrastructure failures: reading configuration,
//!   binding to a port, accepting a connection.
//! - [`RequestError`] is what a pipeline stage or route handler returns when
//!   the current request cannot complete. It skips the remaining stages and
//!   is turned into a response by the
//!   [`ErrorTranslator`](crate::middleware::ErrorTranslator).

use std::convert::Infallible;

use crate::status::Status;

/// Boxed error from an external source (body stream, route handler).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by the server's fallible startup operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value for `{key}`: {reason}")]
    Config { key: &'static str, reason: String },
}

/// A per-request failure.
///
/// Every variant carries a stable [`code`](RequestError::code). The error
/// translator recognises exactly one of them, `EBADCSRFTOKEN`; everything else
/// goes to the default handler, which answers with
/// [`status`](RequestError::status).
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request did not carry a CSRF token matching its secret cookie.
    #[error("invalid csrf token")]
    BadCsrfToken,

    /// The request body stream failed before it was fully read.
    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    /// Filesystem failure while serving a static asset.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Opaque failure raised by a route handler.
    #[error(transparent)]
    Handler(BoxError),
}

impl RequestError {
    /// Wraps an arbitrary handler error.
    ///
    /// ```rust
    /// use catmusic_server::RequestError;
    ///
    /// let err = RequestError::handler("upstream timed out");
    /// assert_eq!(err.code(), "EHANDLER");
    /// ```
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadCsrfToken => "EBADCSRFTOKEN",
            Self::Body(_)      => "EBADBODY",
            Self::Io(_)        => "EIO",
            Self::Handler(_)   => "EHANDLER",
        }
    }

    /// Status the default handler answers with.
    pub fn status(&self) -> Status {
        match self {
            Self::BadCsrfToken => Status::Forbidden,
            Self::Body(_)      => Status::BadRequest,
            Self::Io(_) | Self::Handler(_) => Status::InternalServerError,
        }
    }
}

/// Lets infallible handlers return `Result<_, Infallible>`.
impl From<Infallible> for RequestError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RequestError::BadCsrfToken.code(), "EBADCSRFTOKEN");
        assert_eq!(RequestError::Body("eof".into()).code(), "EBADBODY");
        assert_eq!(RequestError::handler("boom").code(), "EHANDLER");
    }

    #[test]
    fn default_statuses() {
        assert_eq!(RequestError::Body("eof".into()).status(), Status::BadRequest);
        let io = std::io::Error::other("disk");
        assert_eq!(RequestError::from(io).status(), Status::InternalServerError);
    }
}
