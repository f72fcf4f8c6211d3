//! Route dispatch.

use tracing::debug;

use crate::pipeline::{BoxFuture, Exchange, Next, Outcome, Stage};
use crate::router::Router;

/// Runs the route handler matching the request, if any.
///
/// A match ends the chain: the handler's response is merged into the
/// exchange and later stages (compression, static files) do not run. No
/// match passes control on, so API routes take precedence over static files
/// with the same path.
pub struct Dispatch {
    router: Router,
}

impl Dispatch {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Stage for Dispatch {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        let Some((handler, params)) = self.router.lookup(cx.request.method(), cx.request.path())
        else {
            return next.run(cx);
        };

        Box::pin(async move {
            debug!(path = %cx.request.path(), "dispatching to route handler");
            let mut request = std::mem::take(&mut cx.request);
            request.params = params;

            let response = handler.call(request).await?;
            cx.response.merge(response);
            Ok(())
        })
    }
}
