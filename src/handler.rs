//! Route handlers and their type-erased form.
//!
//! Any `async fn(Request) -> impl IntoResponse` is a [`Handler`]. The router
//! stores each one as a [`BoxedHandler`]: a shared closure returning a boxed
//! future, so handlers of different types sit in the same table and the
//! middleware chain can hand the request to whichever one matched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A boxed future resolving to a [`Response`]. Returned by handlers and
/// middleware alike.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A handler with its concrete type erased.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync + 'static>;

/// Implemented for every function usable as a route handler:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
pub trait Handler: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        let handler = self;
        Arc::new(move |req: Request| -> BoxFuture {
            let fut = handler(req);
            Box::pin(async move { fut.await.into_response() })
        })
    }
}
