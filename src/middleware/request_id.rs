//! `X-Request-Id` propagation.

use http::HeaderValue;
use uuid::Uuid;

use super::{BoxFuture, Middleware, Next};
use crate::request::Request;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Keeps an inbound `X-Request-Id` or generates a UUID v4, and sets it on
/// both the request and the response.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestId;

impl RequestId {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestId {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let id = match req.headers().get(REQUEST_ID_HEADER) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => {
                let id = HeaderValue::from_str(&Uuid::new_v4().to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
                req.headers_mut().insert(REQUEST_ID_HEADER, id.clone());
                id
            }
        };
        Box::pin(async move {
            let mut res = next.run(req).await;
            res.headers_mut().insert(REQUEST_ID_HEADER, id);
            res
        })
    }
}
