//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in a single
//! `HashMap<Method, Tree>`, so every handler is hidden behind the
//! `dyn ErasedHandler` trait object:
//!
//! ```text
//! async fn get_album(req: Request) -> Result<Response, E> { … }
//!        ↓ router.get("/api/getAlbum", get_album)
//! get_album.into_boxed_handler()                   ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_album))                   ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_album(req).await.map(..).map_err(Into::into) })
//! ```
//!
//! A handler's `Err` is converted into a [`RequestError`] and travels to the
//! error translator like any other stage failure.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RequestError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to the handler's outcome.
pub(crate) type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Response, RequestError>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the return type of the public
/// `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> HandlerFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, impl Into<RequestError>>
/// ```
///
/// Handlers that cannot fail return `Result<_, Infallible>`. The trait is
/// sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R, E> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<RequestError> + Send + 'static,
{
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<RequestError> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Holds a concrete handler `F` and implements [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R, E> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<RequestError> + Send + 'static,
{
    fn call(&self, req: Request) -> HandlerFuture {
        let fut = (self.0)(req);
        Box::pin(async move {
            fut.await
                .map(IntoResponse::into_response)
                .map_err(Into::into)
        })
    }
}
