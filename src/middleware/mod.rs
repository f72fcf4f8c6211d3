//! Middleware stages.
//!
//! Cross-cutting concerns live here, one module per stage, in the order
//! [`App`](crate::App) chains them:
//!
//! | Stage | Module | Effect |
//! |---|---|---|
//! | [`Cors`] | `cors` | permissive cross-origin headers on every response |
//! | [`CookieParser`] | `cookies` | `Cookie` header → [`Cookies`] extension |
//! | [`CsrfGuard`] | `csrf` | optional token check under `/api` |
//! | [`CsrfIssuer`] | `csrf` | `XSRF-TOKEN` cookie on `GET /` |
//! | [`Dispatch`] | `dispatch` | runs the matching API route handler |
//! | [`Compression`] | `compression` | gzip / deflate on eligible bodies |
//! | [`StaticFiles`] | `static_files` | files from the build directory, else 404 |
//!
//! [`ErrorTranslator`] is not a stage: the [`Pipeline`](crate::Pipeline) calls
//! it when a stage fails.

mod compression;
mod cookies;
mod cors;
mod csrf;
mod dispatch;
mod errors;
mod static_files;

pub use compression::{Compression, DEFAULT_THRESHOLD, Encoding};
pub use cookies::{CookieParser, Cookies};
pub use cors::Cors;
pub use csrf::{CsrfGuard, CsrfIssuer, CsrfKey, CsrfToken, SECRET_COOKIE, XSRF_COOKIE};
pub use dispatch::Dispatch;
pub use errors::{CSRF_REJECTION_MESSAGE, ErrorTranslator, default_error_handler};
pub use static_files::StaticFiles;
