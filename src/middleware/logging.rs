//! Request logging.
//!
//! [`Logging`] wraps the rest of the chain and emits exactly one `tracing`
//! event per request, unless a filter refuses it. The event carries:
//!
//! - `request`: time, method, host, path, query, params, route, ip, referer,
//!   length, and optionally body, header, user-agent and x-forwarded-for
//! - `response`: time, latency, status, length, and optionally body and header
//! - `id`, `trace-id`, `span-id` when enabled and available
//! - `attributes`: whatever the handler added to the request's
//!   [`Attributes`](crate::Attributes), in insertion order
//!
//! Each group is rendered as a JSON object with its keys in the order above.
//!
//! The level follows the final status: `5xx` uses the server-error level,
//! `4xx` the client-error level, anything else the default level. For error
//! statuses the message is the handler's error text, or the status reason
//! phrase when the handler returned none.
//!
//! A custom attribute named `msg` replaces the configured message and is not
//! emitted itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::{REFERER, USER_AGENT};
use http_body_util::BodyExt;
use tracing::Level;

use super::filter::{self, Filter, RequestSnapshot, ResponseSnapshot};
use super::request_id::REQUEST_ID_HEADER;
use super::trace_context::TraceParent;
use super::{BoxFuture, Middleware, Next};
use crate::attributes::{Attr, Value};
use crate::capture::{Capture, CaptureBody, CaptureSnapshot, DEFAULT_BODY_LIMIT};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Request headers that are never logged.
pub const HIDDEN_REQUEST_HEADERS: &[&str] =
    &["authorization", "cookie", "set-cookie", "x-auth-token", "x-csrf-token", "x-xsrf-token"];

/// Response headers that are never logged.
pub const HIDDEN_RESPONSE_HEADERS: &[&str] = &["set-cookie"];

/// Key of the custom attribute that overrides the log message.
const MESSAGE_OVERRIDE: &str = "msg";

/// How a [`Logging`] middleware behaves. Built once, shared by every request.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub default_level: Level,
    pub client_error_level: Level,
    pub server_error_level: Level,

    pub with_user_agent: bool,
    pub with_request_id: bool,
    pub with_request_body: bool,
    pub with_request_header: bool,
    pub with_response_body: bool,
    pub with_response_header: bool,
    pub with_span_id: bool,
    pub with_trace_id: bool,

    pub message: String,
    pub filters: Vec<Filter>,

    pub request_body_limit: usize,
    pub response_body_limit: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            client_error_level: Level::WARN,
            server_error_level: Level::ERROR,
            with_user_agent: false,
            with_request_id: true,
            with_request_body: false,
            with_request_header: false,
            with_response_body: false,
            with_response_header: false,
            with_span_id: false,
            with_trace_id: false,
            message: "Incoming request".to_owned(),
            filters: Vec::new(),
            request_body_limit: DEFAULT_BODY_LIMIT,
            response_body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// The request logging middleware.
#[derive(Clone, Debug)]
pub struct Logging {
    config: Arc<LoggingConfig>,
}

impl Logging {
    pub fn new() -> Self {
        Self::with_config(LoggingConfig::default())
    }

    pub fn with_config(config: LoggingConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    /// Default configuration with the given filter chain.
    pub fn with_filters(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::with_config(LoggingConfig { filters: filters.into_iter().collect(), ..Default::default() })
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Logging {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let config = Arc::clone(&self.config);
        Box::pin(async move {
            let started = Utc::now();
            let clock = Instant::now();
            let parts = RequestParts::capture(&req);
            let attributes = req.attributes().clone();

            let request_body = Capture::new(config.request_body_limit, config.with_request_body);
            let mirror = request_body.clone();
            req.map_body(move |body| CaptureBody::new(body, mirror).boxed());

            let res = next.run(req).await;

            let latency = clock.elapsed();
            let response_body = Capture::new(config.response_body_limit, config.with_response_body);
            response_body.observe(res.body());

            let outcome = Outcome {
                parts,
                response: &res,
                started,
                finished: Utc::now(),
                latency,
                request_body: request_body.snapshot(),
                response_body: response_body.snapshot(),
                custom: attributes.drain(),
            };
            if let Some(record) = assemble(&config, outcome) {
                record.emit();
            }
            res
        })
    }
}

// ── Request snapshot ──────────────────────────────────────────────────────────

/// What the middleware needs from the request, taken before the request
/// moves down the chain.
struct RequestParts {
    method: Method,
    host: String,
    path: String,
    query: String,
    params: Vec<(String, String)>,
    route: String,
    ip: String,
    referer: String,
    user_agent: String,
    forwarded_for: Option<Vec<String>>,
    request_id: Option<String>,
    trace: Option<TraceParent>,
    headers: HeaderMap,
}

impl RequestParts {
    fn capture(req: &Request) -> Self {
        let mut params: Vec<_> = req.params().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        params.sort();
        let forwarded_for = req
            .header("x-forwarded-for")
            .filter(|v| !v.is_empty())
            .map(|v| v.split(',').map(|ip| ip.trim().to_owned()).collect());
        Self {
            method: req.method(),
            host: req.host().to_owned(),
            path: req.path().to_owned(),
            query: req.query().to_owned(),
            params,
            route: req.route().unwrap_or_default().to_owned(),
            ip: req.client_ip().unwrap_or_default(),
            referer: req.header(REFERER.as_str()).unwrap_or_default().to_owned(),
            user_agent: req.header(USER_AGENT.as_str()).unwrap_or_default().to_owned(),
            forwarded_for,
            request_id: non_empty(req.header(REQUEST_ID_HEADER)),
            trace: TraceParent::from_headers(req.headers()),
            headers: req.headers().clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

// ── Assembly ──────────────────────────────────────────────────────────────────

struct Outcome<'a> {
    parts: RequestParts,
    response: &'a Response,
    started: DateTime<Utc>,
    finished: DateTime<Utc>,
    latency: Duration,
    request_body: CaptureSnapshot,
    response_body: CaptureSnapshot,
    custom: Vec<Attr>,
}

/// Builds the record for one finished request, or `None` when a filter
/// refuses it.
fn assemble(config: &LoggingConfig, outcome: Outcome<'_>) -> Option<Record> {
    let Outcome { parts, response, started, finished, latency, request_body, response_body, mut custom } =
        outcome;
    let status = response.status_code();

    let snapshot = RequestSnapshot::new(parts.method, parts.host.as_str(), parts.path.as_str());
    if !filter::all(&config.filters, &snapshot, &ResponseSnapshot::new(status.as_u16())) {
        return None;
    }

    let mut request = vec![
        Attr::new("time", started),
        Attr::new("method", parts.method.as_str()),
        Attr::new("host", parts.host),
        Attr::new("path", parts.path),
        Attr::new("query", parts.query),
        Attr::group("params", parts.params.into_iter().map(|(k, v)| Attr::new(k, v))),
        Attr::new("route", parts.route),
        Attr::new("ip", parts.ip),
        Attr::new("referer", parts.referer),
        Attr::new("length", request_body.length),
    ];
    if config.with_request_body {
        request.push(Attr::new("body", request_body.body.unwrap_or_default()));
    }
    if config.with_request_header {
        request.push(header_group(&parts.headers, HIDDEN_REQUEST_HEADERS));
    }
    if config.with_user_agent {
        request.push(Attr::new("user-agent", parts.user_agent));
    }
    if let Some(hops) = parts.forwarded_for {
        request.push(Attr::new("x-forwarded-for", hops));
    }

    let mut response_attrs = vec![
        Attr::new("time", finished),
        Attr::new("latency", latency),
        Attr::new("status", status.as_u16()),
        Attr::new("length", response_body.length),
    ];
    if config.with_response_body {
        response_attrs.push(Attr::new("body", response_body.body.unwrap_or_default()));
    }
    if config.with_response_header {
        response_attrs.push(header_group(response.headers(), HIDDEN_RESPONSE_HEADERS));
    }

    let id = config
        .with_request_id
        .then(|| parts.request_id.or_else(|| non_empty(response.headers().get(REQUEST_ID_HEADER)?.to_str().ok())))
        .flatten();
    let trace_id = parts.trace.as_ref().filter(|_| config.with_trace_id).map(|t| t.trace_id.clone());
    let span_id = parts.trace.as_ref().filter(|_| config.with_span_id).map(|t| t.span_id.clone());

    let mut message = config.message.clone();
    if let Some(last) = custom.iter().rev().find(|a| a.key() == MESSAGE_OVERRIDE) {
        message = last.value().to_string();
    }
    custom.retain(|a| a.key() != MESSAGE_OVERRIDE);

    let level = if status.is_server_error() {
        config.server_error_level
    } else if status.is_client_error() {
        config.client_error_level
    } else {
        config.default_level
    };
    if status.is_client_error() || status.is_server_error() {
        message = match response.error() {
            Some(error) => error.to_owned(),
            None => status.canonical_reason().unwrap_or_default().to_owned(),
        };
    }

    Some(Record {
        level,
        message,
        request: Value::Group(request),
        response: Value::Group(response_attrs),
        id,
        trace_id,
        span_id,
        custom,
    })
}

/// One `header` group: each visible header name with all of its values.
fn header_group(headers: &HeaderMap, hidden: &[&str]) -> Attr {
    let visible = headers.keys().filter(|name| !hidden.contains(&name.as_str())).map(|name| {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();
        Attr::new(name.as_str(), values)
    });
    Attr::group("header", visible)
}

// ── Record ────────────────────────────────────────────────────────────────────

/// A fully assembled request log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    level: Level,
    message: String,
    request: Value,
    response: Value,
    id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    custom: Vec<Attr>,
}

macro_rules! event_at {
    ($level:expr, $($args:tt)+) => {
        if $level == Level::ERROR {
            tracing::error!($($args)+)
        } else if $level == Level::WARN {
            tracing::warn!($($args)+)
        } else if $level == Level::DEBUG {
            tracing::debug!($($args)+)
        } else if $level == Level::TRACE {
            tracing::trace!($($args)+)
        } else {
            tracing::info!($($args)+)
        }
    };
}

impl Record {
    pub fn level(&self) -> Level { self.level }
    pub fn message(&self) -> &str { &self.message }
    pub fn request(&self) -> &Value { &self.request }
    pub fn response(&self) -> &Value { &self.response }
    pub fn id(&self) -> Option<&str> { self.id.as_deref() }
    pub fn trace_id(&self) -> Option<&str> { self.trace_id.as_deref() }
    pub fn span_id(&self) -> Option<&str> { self.span_id.as_deref() }

    /// Handler-supplied attributes, oldest first.
    pub fn custom(&self) -> &[Attr] { &self.custom }

    /// Every attribute in emission order: `request`, `response`, the ids,
    /// then the custom attributes.
    pub fn attrs(&self) -> Vec<Attr> {
        let mut attrs = vec![
            Attr::new("request", self.request.clone()),
            Attr::new("response", self.response.clone()),
        ];
        let ids = [("id", &self.id), ("trace-id", &self.trace_id), ("span-id", &self.span_id)];
        attrs.extend(ids.into_iter().filter_map(|(key, v)| v.as_ref().map(|v| Attr::new(key, v))));
        attrs.extend(self.custom.iter().cloned());
        attrs
    }

    pub fn emit(&self) {
        let request = self.request.to_json();
        let response = self.response.to_json();
        let attributes = (!self.custom.is_empty()).then(|| Value::Group(self.custom.clone()).to_json());
        event_at!(
            self.level,
            request = %request,
            response = %response,
            id = self.id.as_deref(),
            "trace-id" = self.trace_id.as_deref(),
            "span-id" = self.span_id.as_deref(),
            attributes = attributes.as_deref(),
            "{}",
            self.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    use crate::error::HttpError;
    use crate::response::IntoResponse;

    fn request(builder: http::request::Builder) -> Request {
        Request::from_http(builder.body(String::new()).unwrap()).unwrap()
    }

    fn outcome<'a>(req: &Request, res: &'a Response, custom: Vec<Attr>) -> Outcome<'a> {
        let now = Utc::now();
        Outcome {
            parts: RequestParts::capture(req),
            response: res,
            started: now,
            finished: now,
            latency: Duration::from_millis(3),
            request_body: CaptureSnapshot::default(),
            response_body: CaptureSnapshot { length: res.body().len(), body: None },
            custom,
        }
    }

    fn record(config: &LoggingConfig, res: Response) -> Record {
        let req = request(http::Request::builder().uri("/items?page=2").header("host", "api.local"));
        assemble(config, outcome(&req, &res, Vec::new())).unwrap()
    }

    #[test]
    fn severity_follows_status() {
        let config = LoggingConfig::default();

        let ok = record(&config, Response::text("hi"));
        assert_eq!(ok.level(), Level::INFO);
        assert_eq!(ok.message(), "Incoming request");

        let missing = record(&config, Response::status(StatusCode::NOT_FOUND));
        assert_eq!(missing.level(), Level::WARN);
        assert_eq!(missing.message(), "Not Found");

        let failed = record(&config, HttpError::internal("db down").into_response());
        assert_eq!(failed.level(), Level::ERROR);
        assert_eq!(failed.message(), "db down");

        let unavailable = record(&config, Response::status(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(unavailable.level(), Level::ERROR);
        assert_eq!(unavailable.message(), "Service Unavailable");
    }

    #[test]
    fn request_and_response_groups_have_fixed_fields() {
        let rec = record(&LoggingConfig::default(), Response::text("hello"));
        let req = rec.request();
        assert_eq!(req.get("method").and_then(Value::as_str), Some("GET"));
        assert_eq!(req.get("host").and_then(Value::as_str), Some("api.local"));
        assert_eq!(req.get("path").and_then(Value::as_str), Some("/items"));
        assert_eq!(req.get("query").and_then(Value::as_str), Some("page=2"));
        assert_eq!(req.get("length"), Some(&Value::Uint(0)));
        assert!(req.get("body").is_none());
        assert!(req.get("header").is_none());

        let res = rec.response();
        assert_eq!(res.get("status"), Some(&Value::Uint(200)));
        assert_eq!(res.get("length"), Some(&Value::Uint(5)));
        assert_eq!(res.get("latency"), Some(&Value::Duration(Duration::from_millis(3))));

        let keys: Vec<_> = rec.attrs().iter().map(|a| a.key().to_owned()).collect();
        assert_eq!(keys, ["request", "response"]);
    }

    #[test]
    fn hidden_headers_are_never_logged() {
        let config = LoggingConfig { with_request_header: true, with_response_header: true, ..Default::default() };
        let req = request(
            http::Request::builder()
                .uri("/")
                .header("authorization", "Bearer secret")
                .header("cookie", "a=b")
                .header("x-csrf-token", "t")
                .header("accept", "text/html")
                .header("accept", "application/json"),
        );
        let res = Response::builder().header("set-cookie", "s=1").header("x-served-by", "edge").text("ok");
        let rec = assemble(&config, outcome(&req, &res, Vec::new())).unwrap();

        let headers = rec.request().get("header").unwrap();
        assert!(headers.get("authorization").is_none());
        assert!(headers.get("cookie").is_none());
        assert!(headers.get("x-csrf-token").is_none());
        assert_eq!(headers.get("accept"), Some(&Value::from(vec!["text/html", "application/json"])));

        let headers = rec.response().get("header").unwrap();
        assert!(headers.get("set-cookie").is_none());
        assert!(headers.get("x-served-by").is_some());
    }

    #[test]
    fn custom_attributes_follow_fixed_groups_in_order() {
        let req = request(http::Request::builder().uri("/").header(REQUEST_ID_HEADER, "rid-1"));
        let res = Response::text("ok");
        let custom = vec![Attr::new("first", 1), Attr::group("second", [Attr::new("x", true)]), Attr::new("third", "3")];
        let rec = assemble(&LoggingConfig::default(), outcome(&req, &res, custom)).unwrap();

        let keys: Vec<_> = rec.attrs().iter().map(|a| a.key().to_owned()).collect();
        assert_eq!(keys, ["request", "response", "id", "first", "second", "third"]);
        assert_eq!(rec.id(), Some("rid-1"));
    }

    #[test]
    fn request_id_falls_back_to_response_header() {
        let req = request(http::Request::builder().uri("/"));
        let res = Response::builder().header(REQUEST_ID_HEADER, "from-response").text("ok");
        let rec = assemble(&LoggingConfig::default(), outcome(&req, &res, Vec::new())).unwrap();
        assert_eq!(rec.id(), Some("from-response"));

        let config = LoggingConfig { with_request_id: false, ..Default::default() };
        let rec = assemble(&config, outcome(&req, &res, Vec::new())).unwrap();
        assert_eq!(rec.id(), None);
    }

    #[test]
    fn msg_attribute_overrides_message() {
        let req = request(http::Request::builder().uri("/"));
        let res = Response::text("ok");
        let custom = vec![Attr::new("msg", "custom message"), Attr::new("kept", 1)];
        let rec = assemble(&LoggingConfig::default(), outcome(&req, &res, custom)).unwrap();
        assert_eq!(rec.message(), "custom message");
        assert_eq!(rec.custom().len(), 1);
        assert_eq!(rec.custom()[0].key(), "kept");
    }

    #[test]
    fn error_text_wins_over_msg_attribute() {
        let req = request(http::Request::builder().uri("/"));
        let res = HttpError::bad_request("missing field").into_response();
        let custom = vec![Attr::new("msg", "ignored")];
        let rec = assemble(&LoggingConfig::default(), outcome(&req, &res, custom)).unwrap();
        assert_eq!(rec.message(), "missing field");
        assert!(rec.custom().is_empty());
    }

    #[test]
    fn filters_suppress_the_record() {
        let config = LoggingConfig { filters: vec![filter::accept_method(["GET"])], ..Default::default() };
        let res = Response::text("ok");

        let post = request(http::Request::builder().method("POST").uri("/"));
        assert!(assemble(&config, outcome(&post, &res, Vec::new())).is_none());

        let get = request(http::Request::builder().uri("/"));
        assert!(assemble(&config, outcome(&get, &res, Vec::new())).is_some());
    }

    #[test]
    fn trace_ids_come_from_traceparent() {
        let config = LoggingConfig { with_trace_id: true, with_span_id: true, ..Default::default() };
        let res = Response::text("ok");
        let req = request(
            http::Request::builder()
                .uri("/")
                .header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );
        let rec = assemble(&config, outcome(&req, &res, Vec::new())).unwrap();
        assert_eq!(rec.trace_id(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert_eq!(rec.span_id(), Some("00f067aa0ba902b7"));

        let bare = request(http::Request::builder().uri("/"));
        let rec = assemble(&config, outcome(&bare, &res, Vec::new())).unwrap();
        assert_eq!(rec.trace_id(), None);
        assert_eq!(rec.span_id(), None);
    }

    #[test]
    fn forwarded_for_and_user_agent() {
        let config = LoggingConfig { with_user_agent: true, ..Default::default() };
        let req = request(
            http::Request::builder()
                .uri("/")
                .header("user-agent", "curl/8.0")
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
        );
        let res = Response::text("ok");
        let rec = assemble(&config, outcome(&req, &res, Vec::new())).unwrap();
        assert_eq!(rec.request().get("user-agent").and_then(Value::as_str), Some("curl/8.0"));
        assert_eq!(rec.request().get("x-forwarded-for"), Some(&Value::from(vec!["203.0.113.7", "10.0.0.1"])));
        assert_eq!(rec.request().get("ip").and_then(Value::as_str), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn capture_limits_leave_the_body_intact() {
        use crate::router::Router;

        let config = LoggingConfig {
            with_request_body: true,
            with_response_body: true,
            request_body_limit: 4,
            response_body_limit: 3,
            ..Default::default()
        };
        let router = Arc::new(Router::new().layer(Logging::with_config(config)).post("/", |req: Request| async move {
            String::from_utf8_lossy(req.body()).into_owned()
        }));
        let req = http::Request::builder().method("POST").uri("/").body("0123456789".to_owned()).unwrap();
        let res = router.handle(Request::from_http(req).unwrap()).await;
        assert_eq!(&res.body()[..], b"0123456789");
    }
}
