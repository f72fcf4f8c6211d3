//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. The router is where the
//! API route handlers are mounted; the [`Dispatch`](crate::middleware::Dispatch)
//! stage consults it and falls through to the static stage when nothing
//! matches.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// The API router.
///
/// Build it once at startup and hand it to [`App::new`](crate::App::new).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use std::convert::Infallible;
    /// # use catmusic_server::{Method, Request, Response, Router};
    /// # async fn get_album(_: Request) -> Result<Response, Infallible> { Ok(Response::text("")) }
    /// # async fn get_lyric(_: Request) -> Result<Response, Infallible> { Ok(Response::text("")) }
    /// Router::new()
    ///     .on(Method::Get, "/api/getAlbum",       get_album)
    ///     .on(Method::Get, "/api/getLyric/{mid}", get_lyric);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with an existing one.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Put, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.add(Method::Delete, path, handler)
    }

    fn add(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
