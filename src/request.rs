//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{HOST, HeaderMap};
use http::Uri;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};

use crate::attributes::Attributes;
use crate::error::{BoxError, UnsupportedMethod};
use crate::method::Method;

/// Type-erased streaming request body.
pub type RequestBody = BoxBody<Bytes, BoxError>;

enum Body {
    Stream(RequestBody),
    Full(Bytes),
}

/// An incoming HTTP request.
///
/// The body arrives as a stream. Middleware may wrap it with
/// [`map_body`](Request::map_body); it is read in full just before the route
/// handler runs, so handlers always see [`body`](Request::body) as bytes.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
    params: HashMap<String, String>,
    route: Option<String>,
    remote_addr: Option<SocketAddr>,
    attributes: Attributes,
}

impl Request {
    /// Converts an `http::Request`, giving it a fresh attribute accumulator.
    pub fn from_http<B>(req: http::Request<B>) -> Result<Self, UnsupportedMethod>
    where
        B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Ok(Self {
            method: Method::try_from(&parts.method)?,
            uri: parts.uri,
            headers: parts.headers,
            body: Body::Stream(body.map_err(Into::<BoxError>::into).boxed()),
            params: HashMap::new(),
            route: None,
            remote_addr: None,
            attributes: Attributes::new(),
        })
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> &str { self.uri.query().unwrap_or_default() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The buffered body. Empty until the body has been read, which happens
    /// before the route handler is called.
    pub fn body(&self) -> &[u8] {
        match &self.body {
            Body::Full(bytes) => bytes,
            Body::Stream(_) => &[],
        }
    }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The route pattern that matched, e.g. `/users/{id}`. `None` when the
    /// fallback handler is serving the request.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Host from the `Host` header, or the URI authority for absolute-form
    /// requests.
    pub fn host(&self) -> &str {
        self.header(HOST.as_str())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default()
    }

    /// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then
    /// the peer address of the connection.
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        forwarded
            .or_else(|| self.header("x-real-ip"))
            .map(str::to_owned)
            .or_else(|| self.remote_addr.map(|a| a.ip().to_string()))
    }

    /// This request's attribute accumulator. Clone it to hand to sub-tasks.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Wraps the body stream. A body that was already read is turned back
    /// into a stream first.
    pub fn map_body<F>(&mut self, f: F)
    where
        F: FnOnce(RequestBody) -> RequestBody,
    {
        let stream = match std::mem::replace(&mut self.body, Body::Full(Bytes::new())) {
            Body::Stream(stream) => stream,
            Body::Full(bytes) => Full::new(bytes).map_err(|never| -> BoxError { match never {} }).boxed(),
        };
        self.body = Body::Stream(f(stream));
    }

    pub(crate) fn set_route(&mut self, route: String, params: HashMap<String, String>) {
        self.route = Some(route);
        self.params = params;
    }

    /// Reads the body stream to the end.
    pub(crate) async fn buffer_body(&mut self) -> Result<(), BoxError> {
        if let Body::Stream(stream) = std::mem::replace(&mut self.body, Body::Full(Bytes::new())) {
            self.body = Body::Full(stream.collect().await?.to_bytes());
        }
        Ok(())
    }
}
