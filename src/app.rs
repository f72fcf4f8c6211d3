//! The assembled application: configuration plus API routes, turned into a
//! pipeline that answers hyper requests.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::Config;
use crate::error::{BoxError, RequestError};
use crate::method::Method;
use crate::middleware::{
    Compression, CookieParser, Cors, CsrfGuard, CsrfIssuer, CsrfKey, Dispatch, ErrorTranslator,
    StaticFiles,
};
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::Router;
use crate::status::Status;

/// A cheaply cloneable handle to the request pipeline.
///
/// ```rust,no_run
/// use catmusic_server::{App, Config, Router, Server};
///
/// # async fn run() -> Result<(), catmusic_server::Error> {
/// let config = Config::from_env()?;
/// let app = App::new(&config, Router::new());
/// Server::bind(config.addr()).serve(app).await
/// # }
/// ```
#[derive(Clone)]
pub struct App {
    pipeline: Arc<Pipeline>,
}

impl App {
    /// Builds the stage chain:
    ///
    /// `Cors → CookieParser → [CsrfGuard] → CsrfIssuer → Dispatch(router) →
    /// Compression → StaticFiles`
    ///
    /// The guard is mounted only when `config.csrf.protection` is set.
    pub fn new(config: &Config, router: Router) -> Self {
        if router.is_empty() {
            info!("no API routes mounted, serving static files only");
        }

        let key = match &config.csrf.secret {
            Some(secret) => CsrfKey::derive(secret),
            None => CsrfKey::random(),
        };

        let mut pipeline = Pipeline::new(ErrorTranslator::new(&config.csrf.rejection_message))
            .stage(Cors)
            .stage(CookieParser);

        if config.csrf.protection {
            pipeline = pipeline.stage(CsrfGuard::new(
                key.clone(),
                config.csrf.path_prefix.clone(),
                config.csrf.ignore_methods.clone(),
            ));
        }

        let pipeline = pipeline
            .stage(CsrfIssuer::new(key))
            .stage(Dispatch::new(router))
            .stage(Compression::new(config.compression_threshold))
            .stage(StaticFiles::new(config.static_root.clone()));

        debug!(
            stages = pipeline.len(),
            csrf_protection = config.csrf.protection,
            static_root = %config.static_root.display(),
            "pipeline assembled"
        );

        Self { pipeline: Arc::new(pipeline) }
    }

    /// Answers one request. Never fails: every error becomes a response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let span = info_span!("request", method = %parts.method, path = %parts.uri.path());

        async move {
            let Ok(method) = Method::try_from(&parts.method) else {
                warn!("unsupported method");
                let status = Status::MethodNotAllowed;
                let mut response = Response::status(status);
                Cors::apply(&mut response);
                response.set_header("content-type", ContentType::Text.as_str());
                response.set_body(status.reason().as_bytes().to_vec());
                return finish(response, started);
            };

            let response = match body.collect().await {
                Ok(collected) => {
                    let body = collected.to_bytes();
                    let request = Request::new(method, &parts.uri, &parts.headers, body);
                    self.pipeline.run(request).await
                }
                Err(e) => {
                    let mut response = Response::default();
                    Cors::apply(&mut response);
                    self.pipeline.reject(RequestError::Body(e.into()), response)
                }
            };
            finish(response, started)
        }
        .instrument(span)
        .await
    }
}

fn finish(response: Response, started: Instant) -> http::Response<Full<Bytes>> {
    info!(
        status = response.status_code(),
        latency_ms = started.elapsed().as_secs_f64() * 1000.0,
        "request completed"
    );
    response.into_inner()
}
