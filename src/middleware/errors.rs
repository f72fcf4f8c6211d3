//! Error translation.
//!
//! Runs only when a stage fails. It has exactly one rule: a bad CSRF token
//! becomes a fixed `403` page. Every other error is handed to
//! [`default_error_handler`].

use tracing::{error, warn};

use crate::error::RequestError;
use crate::response::{ContentType, Response, escape_html};
use crate::status::Status;

/// Guidance shown when a request fails CSRF validation: the API is
/// CSRF-protected, proxy it through your own server.
pub const CSRF_REJECTION_MESSAGE: &str =
    "接口已经被我用 CSRF 保护了，请参考课程用自己的服务器代理接口";

/// Converts recognised errors into a stable response.
#[derive(Clone, Debug)]
pub struct ErrorTranslator {
    csrf_page: String,
}

impl ErrorTranslator {
    /// `message` is HTML-escaped and wrapped in a paragraph.
    pub fn new(message: &str) -> Self {
        Self { csrf_page: format!("<p>{}</p>", escape_html(message)) }
    }

    /// Writes the CSRF page for `EBADCSRFTOKEN`; returns any other error
    /// untouched.
    pub fn translate(
        &self,
        err: RequestError,
        response: &mut Response,
    ) -> Result<(), RequestError> {
        match err {
            RequestError::BadCsrfToken => {
                response.set_status(Status::Forbidden);
                response.set_header("content-type", ContentType::Html.as_str());
                response.remove_header("content-encoding");
                response.set_body(self.csrf_page.clone().into_bytes());
                Ok(())
            }
            other => Err(other),
        }
    }
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(CSRF_REJECTION_MESSAGE)
    }
}

/// Fallback for errors the translator does not recognise.
///
/// Answers with [`RequestError::status`] and its reason phrase as plain
/// text. Headers set earlier in the chain, other than `content-type` and
/// `content-encoding`, are kept.
pub fn default_error_handler(err: RequestError, response: &mut Response) {
    let status = err.status();
    if status == Status::InternalServerError {
        error!(code = err.code(), error = %err, "request failed");
    } else {
        warn!(code = err.code(), error = %err, "request rejected");
    }

    response.set_status(status);
    response.set_header("content-type", ContentType::Text.as_str());
    response.remove_header("content-encoding");
    response.set_body(status.reason().as_bytes().to_vec());
}
