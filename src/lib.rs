//! # vigil
//!
//! A small HTTP service scaffold whose interesting part is its request
//! logging pipeline.
//!
//! - Radix-tree routing via [`matchit`], hyper for the connections
//! - Graceful shutdown on SIGTERM / Ctrl-C, draining in-flight requests
//! - [`middleware::Logging`]: one structured `tracing` record per request
//!   with bounded body capture, a filter chain and status-based levels
//! - [`Attributes`]: a per-request accumulator handlers fill while they
//!   work, drained into that request's log record
//! - [`middleware::Recover`]: panics become `500`s and a `PANIC` record
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vigil::middleware::{Logging, Recover};
//! use vigil::{Attr, HttpError, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vigil::Error> {
//!     let app = Router::new()
//!         .layer(Logging::new())
//!         .layer(Recover::new())
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, HttpError> {
//!     let id = req.param("id").unwrap_or_default();
//!     if id.is_empty() {
//!         return Err(HttpError::bad_request("missing id"));
//!     }
//!     req.attributes().add(Attr::group("lookup", [Attr::new("user", id)]));
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
//! }
//! ```

mod attributes;
mod capture;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod service;
pub mod telemetry;

pub use attributes::{Attr, Attributes, Value};
pub use capture::{Capture, CaptureBody, CaptureBuffer, CaptureSnapshot, DEFAULT_BODY_LIMIT};
pub use error::{ApiError, BoxError, Error, HttpError, UnsupportedMethod};
pub use handler::Handler;
pub use http::StatusCode;
pub use method::Method;
pub use request::{Request, RequestBody};
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
