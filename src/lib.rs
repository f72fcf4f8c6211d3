//! # catmusic-server
//!
//! The backend in front of the catmusic single-page client. It serves the
//! built front-end, mounts the JSON API handlers under `/api`, and wraps both
//! in the same request pipeline.
//!
//! ## The pipeline
//!
//! Every request passes through a fixed chain of stages
//! (see [`middleware`]):
//!
//! 1. permissive CORS headers on every response;
//! 2. cookie parsing;
//! 3. optional CSRF validation for `/api` requests;
//! 4. an `XSRF-TOKEN` cookie on `GET /`;
//! 5. the API router;
//! 6. gzip / deflate compression;
//! 7. static files from the build directory, else a 404 page.
//!
//! A stage that fails with a [`RequestError`] skips the rest of the chain.
//! A bad CSRF token becomes a fixed `403` page; anything else gets a plain
//! `400`/`500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::convert::Infallible;
//!
//! use catmusic_server::{App, Config, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), catmusic_server::Error> {
//!     let config = Config::from_env()?;
//!     let api = Router::new().get("/api/getLyric", get_lyric);
//!
//!     Server::bind(config.addr()).serve(App::new(&config, api)).await
//! }
//!
//! async fn get_lyric(req: Request) -> Result<Response, Infallible> {
//!     let mid = req.query_param("mid").unwrap_or_default();
//!     Ok(Response::json(format!(r#"{{"code":0,"mid":"{mid}"}}"#).into_bytes()))
//! }
//! ```

mod app;
mod config;
mod error;
mod handler;
mod method;
mod pipeline;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod middleware;

pub use app::App;
pub use config::{Config, CsrfConfig};
pub use error::{BoxError, Error, RequestError};
pub use handler::Handler;
pub use method::{Method, UnknownMethod};
pub use pipeline::{BoxFuture, Exchange, Next, Outcome, Pipeline, Stage};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use status::Status;
