//! Error types.
//!
//! [`Error`] covers infrastructure failures: binding a port, accepting a
//! connection. Handler failures are [`HttpError`]s, which turn into JSON error
//! responses and carry their message through to the request log.

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::response::{IntoResponse, Json, Response};

/// Returned by [`Server::serve`](crate::Server::serve).
#[derive(Debug, Error)]
#[error("io: {0}")]
pub struct Error(#[from] std::io::Error);

/// A request used an HTTP method the router does not know.
#[derive(Debug, Error)]
#[error("unsupported method `{0}`")]
pub struct UnsupportedMethod(pub(crate) String);

/// Boxed error used for request body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An error a handler returns instead of a success response.
///
/// Rendered as `{"message": "..."}` with the given status. The logging
/// middleware uses the message as the log line for 4xx and 5xx responses.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}

/// An error carrying only a status uses the status's reason phrase.
impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or_default())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = Json(ErrorBody { message: &self.message }).into_response();
        response.set_status(self.status);
        response.set_error(self.message);
        response
    }
}

// ── ApiError ──────────────────────────────────────────────────────────────────

/// Domain errors with a fixed HTTP status.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("DocumentNotFound")]
    DocumentNotFound,
    #[error("InternalServiceError")]
    InternalServiceError,
    #[error("MethodNotAllowed")]
    MethodNotAllowed,
    #[error("InvalidContentType")]
    InvalidContentType,
    #[error("InvalidContentLength")]
    InvalidContentLength,
    #[error("BadGateway")]
    BadGateway,
    #[error("GatewayTimeout")]
    GatewayTimeout,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("LengthRequired")]
    LengthRequired,
    #[error("PayloadTooLarge")]
    PayloadTooLarge,
    #[error("URITooLong")]
    UriTooLong,
    #[error("UnsupportedMediaType")]
    UnsupportedMediaType,
    #[error("ImATeaPot")]
    ImATeapot,
    #[error("TooManyRequests")]
    TooManyRequests,
}

impl ApiError {
    pub fn status(self) -> StatusCode {
        match self {
            Self::DocumentNotFound     => StatusCode::NOT_FOUND,
            Self::InternalServiceError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed     => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidContentType   => StatusCode::BAD_REQUEST,
            Self::InvalidContentLength => StatusCode::BAD_REQUEST,
            Self::BadGateway           => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout       => StatusCode::GATEWAY_TIMEOUT,
            Self::Unauthorized         => StatusCode::UNAUTHORIZED,
            Self::Forbidden            => StatusCode::FORBIDDEN,
            Self::LengthRequired       => StatusCode::LENGTH_REQUIRED,
            Self::PayloadTooLarge      => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UriTooLong           => StatusCode::URI_TOO_LONG,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ImATeapot            => StatusCode::IM_A_TEAPOT,
            Self::TooManyRequests      => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        HttpError::from(self).into_response()
    }
}
