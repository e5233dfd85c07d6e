//! The `vigil` service: routes, middleware stack and configuration.
//!
//! ```rust,no_run
//! use vigil::service::{self, ServiceConfig};
//! use vigil::Server;
//!
//! # async fn run() -> Result<(), vigil::Error> {
//! let config = ServiceConfig::from_env(8080);
//! Server::bind(config.addr()).serve(service::router()).await
//! # }
//! ```

/// `filename`, `line` and `function` attributes naming the place this is
/// written.
macro_rules! call_site {
    () => {{
        fn here() {}
        let name = std::any::type_name_of_val(&here);
        let mut function = name.strip_suffix("::here").unwrap_or(name);
        while let Some(outer) = function.strip_suffix("::{{closure}}") {
            function = outer;
        }
        [
            $crate::attributes::Attr::new("filename", file!()),
            $crate::attributes::Attr::new("line", line!()),
            $crate::attributes::Attr::new("function", function),
        ]
    }};
}

mod config;
mod debug;
mod health;

pub use config::ServiceConfig;
pub use debug::{DefaultInfo, debug, default_info};
pub use health::{MockService, StatusReport, healthcheck, status};

use crate::middleware::{Logging, LoggingConfig, Recover, RequestId};
use crate::router::Router;

/// Logging settings used by the service.
pub fn logging_config() -> LoggingConfig {
    LoggingConfig {
        with_user_agent: true,
        with_request_id: true,
        message: "REQUEST".to_owned(),
        ..Default::default()
    }
}

/// The full application: logging, request ids and panic recovery around the
/// service endpoints. `RequestId` wraps `Recover` so a recovered `500` still
/// carries its id.
pub fn router() -> Router {
    Router::new()
        .layer(Logging::with_config(logging_config()))
        .layer(RequestId::new())
        .layer(Recover::new())
        .get("/", default_info)
        .get("/healthcheck", healthcheck)
        .get("/status", status)
        .get("/debug", debug)
}

/// Name of the attribute group a handler reports under: `root` for `/`,
/// otherwise the title-cased path segments run together.
pub fn group_name(route: &str) -> String {
    if route == "/" {
        return "root".to_owned();
    }
    route.split('/').filter(|s| !s.is_empty()).map(title_case).collect()
}

fn title_case(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
