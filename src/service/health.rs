//! `/healthcheck` and `/status`.
//!
//! `/status` asks every downstream service for its state at once. Each probe
//! runs in its own task and reports over a channel; results arrive in any
//! order and are routed to their slot by service name.

use std::time::{Duration, Instant};

use http::StatusCode;
use serde::Serialize;
use tokio::sync::mpsc;

use super::config::or_default;
use super::group_name;
use crate::attributes::{Attr, Attributes};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Json;

const UP: &str = "🟢";
const DOWN: &str = "🔴";

pub async fn healthcheck(req: Request) -> Json<[&'static str; 1]> {
    let health = ["OK"];
    req.attributes().add(Attr::group(route_group(&req), [Attr::new("health", health.to_vec())]));
    Json(health)
}

/// A stand-in for a downstream dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockService {
    name: String,
    failure: Option<String>,
}

impl MockService {
    pub fn up(name: impl Into<String>) -> Self {
        Self { name: name.into(), failure: None }
    }

    pub fn failing(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self { name: name.into(), failure: Some(error.into()) }
    }

    async fn call(&self) -> Result<String, HttpError> {
        match &self.failure {
            Some(error) => Err(HttpError::internal(error.clone())),
            None => Ok(format!("Mock service {} is up", self.name)),
        }
    }
}

/// One service's answer.
#[derive(Clone, Debug)]
struct ServiceStatus {
    name: String,
    code: u16,
    message: String,
    emoji: &'static str,
    error: Option<HttpError>,
    rtt: Duration,
}

impl ServiceStatus {
    fn missing(name: &str) -> Self {
        let error = HttpError::internal("probe did not report");
        Self {
            name: name.to_owned(),
            code: error.status().as_u16(),
            message: error.message().to_owned(),
            emoji: DOWN,
            error: Some(error),
            rtt: Duration::ZERO,
        }
    }

    fn attr(&self) -> Attr {
        let mut attrs = vec![
            Attr::new("code", self.code),
            Attr::new("message", self.message.as_str()),
            Attr::new("emoji", self.emoji),
        ];
        if let Some(error) = &self.error {
            attrs.push(Attr::new("error", error.message()));
            attrs.push(Attr::new("error_code", error.status().as_u16()));
        }
        Attr::group(self.name.as_str(), attrs)
    }
}

/// Runs one probe. A failure is also recorded as its own attribute group,
/// straight from the probing task, with the call site when `call_site` is set.
async fn check(service: MockService, attributes: Attributes, started: Instant, call_site: bool) -> ServiceStatus {
    match service.call().await {
        Ok(message) => ServiceStatus {
            name: service.name,
            code: StatusCode::OK.as_u16(),
            message,
            emoji: UP,
            error: None,
            rtt: started.elapsed(),
        },
        Err(error) => {
            let key = format!("MOCK_{}_REQUEST_ERROR", service.name.to_uppercase());
            let mut details = vec![Attr::new("error", error.message())];
            if call_site {
                details.extend(call_site!());
            }
            attributes.add(Attr::group(key, details));
            ServiceStatus {
                name: service.name,
                code: error.status().as_u16(),
                message: error.message().to_owned(),
                emoji: DOWN,
                error: Some(error),
                rtt: started.elapsed(),
            }
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub service1: String,
    pub service2: String,
    pub service3: String,
}

const SLOTS: [&str; 3] = ["service1", "service2", "service3"];

pub async fn status(req: Request) -> Json<StatusReport> {
    let attributes = req.attributes().clone();
    let group = route_group(&req);
    let call_site = or_default(std::env::var("MY_ENVTYPE").ok(), "local") != "staging";
    report(attributes, group, SLOTS.map(MockService::up), call_site).await
}

/// Probes `services` concurrently and files each result under its slot.
async fn report(
    attributes: Attributes,
    group: String,
    services: [MockService; 3],
    call_site: bool,
) -> Json<StatusReport> {
    let started = Instant::now();
    let (tx, mut rx) = mpsc::channel(services.len());
    for service in services {
        let tx = tx.clone();
        let attributes = attributes.clone();
        tokio::spawn(async move {
            let _ = tx.send(check(service, attributes, started, call_site).await).await;
        });
    }
    drop(tx);

    let mut slots: [Option<ServiceStatus>; 3] = Default::default();
    while let Some(status) = rx.recv().await {
        tracing::debug!(service = %status.name, rtt = ?status.rtt, "probe reported");
        if let Some(i) = SLOTS.iter().position(|slot| *slot == status.name) {
            slots[i] = Some(status);
        }
    }

    let statuses: Vec<ServiceStatus> = slots
        .into_iter()
        .zip(SLOTS)
        .map(|(status, name)| status.unwrap_or_else(|| ServiceStatus::missing(name)))
        .collect();
    attributes.add(Attr::group(group, statuses.iter().map(ServiceStatus::attr)));

    Json(StatusReport {
        service1: statuses[0].emoji.to_owned(),
        service2: statuses[1].emoji.to_owned(),
        service3: statuses[2].emoji.to_owned(),
    })
}

fn route_group(req: &Request) -> String {
    group_name(req.route().unwrap_or(req.path()))
}
