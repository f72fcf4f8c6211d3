//! The request pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Each stage receives the
//! [`Exchange`] (the request and the one response being built for it) and a
//! [`Next`] continuation. A stage either awaits `next.run(cx)` to hand control
//! to the rest of the chain, returns without calling it to finish the
//! request, or returns an error.
//!
//! ```text
//! Cors → CookieParser → [CsrfGuard] → CsrfIssuer → Dispatch → Compression → StaticFiles
//!                                   │ Err(RequestError) from any stage
//!                                   └──────────────→ ErrorTranslator → default handler
//! ```
//!
//! An error skips every stage not yet entered. Stages already on the stack
//! see it as the `Err` of their `next.run(cx).await` and normally propagate it
//! with `?`. Because the error is resolved onto the same response, headers
//! written before the failure are kept.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RequestError;
use crate::middleware::{ErrorTranslator, default_error_handler};
use crate::request::Request;
use crate::response::Response;

/// A boxed, `Send` future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a stage resolves to. The response lives in the [`Exchange`].
pub type Outcome = Result<(), RequestError>;

/// One HTTP exchange: the request and the response built for it.
#[derive(Debug, Default)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self { request, response: Response::default() }
    }
}

/// A pipeline stage.
///
/// Implementors that only act before the rest of the chain can return
/// `next.run(cx)` directly; those that act afterwards wrap it in
/// `Box::pin(async move { .. })`.
pub trait Stage: Send + Sync + 'static {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
}

impl<'a> Next<'a> {
    /// Runs the remaining stages. An empty remainder leaves the response as is.
    pub fn run<'b>(self, cx: &'b mut Exchange) -> BoxFuture<'b, Outcome>
    where
        'a: 'b,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.call(cx, Next { stages: rest }),
            None => Box::pin(async { Ok(()) }),
        }
    }
}

/// An ordered chain of stages plus the error translator.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    errors: ErrorTranslator,
}

impl Pipeline {
    pub fn new(errors: ErrorTranslator) -> Self {
        Self { stages: Vec::new(), errors }
    }

    /// Appends a stage. Stages run in the order they are added.
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Drives one request through every stage and returns its response.
    pub async fn run(&self, request: Request) -> Response {
        let mut cx = Exchange::new(request);
        let next = Next { stages: &self.stages };
        if let Err(err) = next.run(&mut cx).await {
            self.resolve(err, &mut cx.response);
        }
        cx.response
    }

    /// Resolves an error raised before any stage could run onto `response`.
    pub fn reject(&self, err: RequestError, mut response: Response) -> Response {
        self.resolve(err, &mut response);
        response
    }

    fn resolve(&self, err: RequestError, response: &mut Response) {
        if let Err(unrecognised) = self.errors.translate(err, response) {
            default_error_handler(unrecognised, response);
        }
    }
}
