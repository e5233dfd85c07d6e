//! Middleware layer.
//!
//! Middleware wraps the route handler and is the place for cross-cutting
//! concerns. Each one receives the request and a [`Next`] continuation; it
//! may inspect or modify the request, call `next.run(req)`, then inspect or
//! modify the response.
//!
//! Built-in middleware:
//! - [`Logging`]: one structured record per request, with bounded body
//!   capture, accumulated handler attributes and a filter chain
//! - [`Recover`]: turns handler panics into `500` responses and logs them
//! - [`RequestId`]: propagates or generates `X-Request-Id`
//!
//! ```rust,no_run
//! use vigil::middleware::{self, Logging, Recover, RequestId};
//! use vigil::Router;
//!
//! let app = Router::new()
//!     .layer(Logging::new())
//!     .layer(RequestId::new())
//!     .layer(Recover::new())
//!     .layer(middleware::from_fn(|req, next: middleware::Next| async move {
//!         next.run(req).await
//!     }));
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::HttpError;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;

pub mod filter;
mod logging;
mod recover;
mod request_id;
mod trace_context;

pub use crate::handler::BoxFuture;
pub use filter::{Filter, RequestSnapshot, ResponseSnapshot};
pub use logging::{Logging, LoggingConfig, Record};
pub use recover::{DEFAULT_STACK_SIZE, Recover, Recovered, log_panic};
pub use request_id::{REQUEST_ID_HEADER, RequestId};
pub use trace_context::TraceParent;

/// A request/response interceptor.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// The rest of the chain: the remaining middleware, then the route handler.
pub struct Next {
    router: Arc<Router>,
    depth: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(router: Arc<Router>, endpoint: BoxedHandler) -> Self {
        Self { router, depth: 0, endpoint }
    }

    /// Passes the request on. When no middleware is left the body is read in
    /// full and the route handler runs.
    pub fn run(self, mut req: Request) -> BoxFuture {
        let Self { router, depth, endpoint } = self;
        match router.layers.get(depth).cloned() {
            Some(layer) => layer.call(req, Self { router, depth: depth + 1, endpoint }),
            None => Box::pin(async move {
                if let Err(err) = req.buffer_body().await {
                    return HttpError::bad_request(format!("reading request body: {err}")).into_response();
                }
                endpoint(req).await
            }),
        }
    }
}

/// Middleware built from an async closure. See [`from_fn`].
pub struct FromFn<F>(F);

/// Turns `async |req, next| -> Response` into a [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(f)
}

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self.0)(req, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use http::StatusCode;

    use crate::response::Response;

    fn get(uri: &str) -> Request {
        Request::from_http(http::Request::builder().uri(uri).body(String::new()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn first_layer_is_outermost() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tag = |name: &'static str| {
            let order = Arc::clone(&order);
            from_fn(move |req, next: Next| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(format!("{name}>"));
                    let res = next.run(req).await;
                    order.lock().unwrap().push(format!("<{name}"));
                    res
                }
            })
        };

        let router = Arc::new(
            Router::new()
                .layer(tag("outer"))
                .layer(tag("inner"))
                .get("/", |_req: Request| async { "ok" }),
        );
        router.handle(get("/")).await;

        assert_eq!(*order.lock().unwrap(), ["outer>", "inner>", "<inner", "<outer"]);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let router = Arc::new(
            Router::new()
                .layer(from_fn(|_req, _next: Next| async { Response::status(StatusCode::FORBIDDEN) }))
                .get("/", |_req: Request| async { "unreachable" }),
        );
        let res = router.handle(get("/")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handler_sees_buffered_body() {
        let router = Arc::new(Router::new().post("/", |req: Request| async move {
            String::from_utf8_lossy(req.body()).into_owned()
        }));
        let req = http::Request::builder().method("POST").uri("/").body("hello".to_owned()).unwrap();
        let res = router.handle(Request::from_http(req).unwrap()).await;
        assert_eq!(&res.body()[..], b"hello");
    }
}
