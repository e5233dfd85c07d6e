//! Records `tracing` events so tests can assert on emitted log lines.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use vigil::{Request, Response, Router};

#[derive(Clone, Debug)]
pub struct Logged {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl Logged {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Parses a field holding a JSON group.
    pub fn json(&self, name: &str) -> serde_json::Value {
        let raw = self.field(name).unwrap_or_else(|| panic!("no field `{name}` in {self:?}"));
        serde_json::from_str(raw).unwrap_or_else(|e| panic!("field `{name}` is not JSON ({e}): {raw}"))
    }
}

#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<Logged>>>);

impl Captured {
    pub fn all(&self) -> Vec<Logged> {
        self.0.lock().unwrap().clone()
    }

    /// Request log records, recognised by their `request` group.
    pub fn requests(&self) -> Vec<Logged> {
        self.all().into_iter().filter(|e| e.fields.contains_key("request")).collect()
    }

    pub fn with_message(&self, message: &str) -> Vec<Logged> {
        self.all().into_iter().filter(|e| e.message == message).collect()
    }
}

struct CaptureLayer(Captured);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = Fields::default();
        event.record(&mut visitor);
        self.0.0.lock().unwrap().push(Logged {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Fields {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// Captures every event on the current thread until the guard drops.
pub fn capture() -> (Captured, DefaultGuard) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(captured.clone()));
    (captured, tracing::subscriber::set_default(subscriber))
}

pub async fn send(router: &Arc<Router>, req: http::Request<String>) -> Response {
    Arc::clone(router).handle(Request::from_http(req).unwrap()).await
}

pub async fn get(router: &Arc<Router>, uri: &str) -> Response {
    send(router, http::Request::builder().uri(uri).body(String::new()).unwrap()).await
}
