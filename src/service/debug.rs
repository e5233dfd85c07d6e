//! Landing page and environment dump.

use std::collections::BTreeMap;

use serde::Serialize;

use super::config::or_default;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;

const REDACTED: &str = "REDACTED";

/// Body of `GET /`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DefaultInfo {
    pub title: String,
    pub environment: String,
    pub instance_type: String,
    pub service: String,
    pub service_version: String,
}

impl DefaultInfo {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            title: "Welcome to the default page".to_owned(),
            environment: or_default(lookup("MY_ENVTYPE"), "local"),
            instance_type: or_default(lookup("MY_INSTANCETYPE"), "local"),
            service: or_default(lookup("SERVICE_NAME"), "default"),
            service_version: or_default(lookup("SERVICE_VERSION"), "v1"),
        }
    }
}

pub async fn default_info(_req: Request) -> Result<Response, HttpError> {
    let info = DefaultInfo::from_lookup(|key| std::env::var(key).ok());
    pretty(&info)
}

/// `GET /debug`: every environment variable, sorted by name. Values of
/// names ending in `_TOKEN` or `_KEY` are replaced.
pub async fn debug(_req: Request) -> Result<Response, HttpError> {
    pretty(&redact(std::env::vars()))
}

fn redact(vars: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, String> {
    vars.into_iter()
        .map(|(key, value)| {
            let value = if key.ends_with("_TOKEN") || key.ends_with("_KEY") { REDACTED.to_owned() } else { value };
            (key, value)
        })
        .collect()
}

fn pretty<T: Serialize>(body: &T) -> Result<Response, HttpError> {
    let bytes = serde_json::to_vec_pretty(body).map_err(|e| HttpError::internal(e.to_string()))?;
    Ok(Response::json(bytes))
}
