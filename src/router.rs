//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Routing happens before
//! the middleware stack runs, so middleware can see the matched route and its
//! parameters.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use serde::Serialize;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};

struct Route {
    pattern: String,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// # use vigil::{Request, Response, Router};
/// # async fn get_user(_: Request) -> Response { Response::text("") }
/// # async fn create_user(_: Request) -> Response { Response::text("") }
/// Router::new()
///     .get("/users/{id}", get_user)
///     .post("/users", create_user);
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    pub(crate) layers: Vec<Arc<dyn Middleware>>,
    fallback: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            layers: Vec::new(),
            fallback: not_found.into_boxed_handler(),
        }
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let route = Route { pattern: path.to_owned(), handler: handler.into_boxed_handler() };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Adds a middleware. The first one added is the outermost: it sees the
    /// request first and the response last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Replaces the handler used when no route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = handler.into_boxed_handler();
        self
    }

    /// Routes one request through the middleware stack and its handler.
    pub async fn handle(self: Arc<Self>, mut req: Request) -> Response {
        let handler = match self.lookup(req.method(), req.path()) {
            Some((route, params)) => {
                let handler = Arc::clone(&route.handler);
                req.set_route(route.pattern.clone(), params);
                handler
            }
            None => Arc::clone(&self.fallback),
        };
        Next::new(self, handler).run(req).await
    }

    fn lookup(&self, method: Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(normalize(path)).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// `/status/` routes like `/status`; the root stays `/`.
fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[derive(Serialize)]
struct NotSupported {
    error: &'static str,
    code: u16,
}

async fn not_found(_req: Request) -> Response {
    let body = NotSupported { error: "Not Supported", code: StatusCode::NOT_FOUND.as_u16() };
    let mut res = Json(body).into_response();
    res.set_status(StatusCode::NOT_FOUND);
    res
}
