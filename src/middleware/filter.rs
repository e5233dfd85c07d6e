//! Predicates that decide whether a request gets logged.
//!
//! A filter sees only a snapshot of the finished exchange (method, host,
//! path, final status), so filters can be built and tested without a
//! server. The logging middleware evaluates its filters in order and drops
//! the record at the first one that returns `false`.
//!
//! Every family comes in an `accept_*` form and an `ignore_*` form, the
//! second being the exact negation of the first:
//!
//! ```rust
//! use vigil::middleware::filter::{self, RequestSnapshot, ResponseSnapshot};
//! use vigil::Method;
//!
//! let chain = [
//!     filter::accept_method(["GET"]),
//!     filter::ignore_path_prefix(["/internal"]),
//! ];
//! let req = RequestSnapshot::new(Method::Get, "api.local", "/users");
//! let res = ResponseSnapshot::new(200);
//! assert!(filter::all(&chain, &req, &res));
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::method::Method;

/// The request half of what a filter sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: Method,
    pub host: String,
    pub path: String,
}

impl RequestSnapshot {
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method, host: host.into(), path: path.into() }
    }
}

/// The response half of what a filter sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
}

impl ResponseSnapshot {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

type Predicate = dyn Fn(&RequestSnapshot, &ResponseSnapshot) -> bool + Send + Sync;

/// A pure predicate over a finished request. Cheap to clone.
#[derive(Clone)]
pub struct Filter(Arc<Predicate>);

impl Filter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RequestSnapshot, &ResponseSnapshot) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn allows(&self, req: &RequestSnapshot, res: &ResponseSnapshot) -> bool {
        (self.0)(req, res)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// `true` when every filter allows the request. Stops at the first refusal;
/// an empty chain allows everything.
pub fn all(filters: &[Filter], req: &RequestSnapshot, res: &ResponseSnapshot) -> bool {
    filters.iter().all(|f| f.allows(req, res))
}

/// Keeps requests the predicate allows.
pub fn accept(filter: Filter) -> Filter {
    filter
}

/// Keeps requests the predicate refuses.
pub fn ignore(filter: Filter) -> Filter {
    Filter::new(move |req, res| !filter.allows(req, res))
}

fn owned<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items.into_iter().map(Into::into).collect()
}

// ── Method ────────────────────────────────────────────────────────────────────

/// Method names compare case-insensitively.
pub fn accept_method<S: Into<String>>(methods: impl IntoIterator<Item = S>) -> Filter {
    let methods = owned(methods);
    Filter::new(move |req, _| methods.iter().any(|m| req.method.is(m)))
}

pub fn ignore_method<S: Into<String>>(methods: impl IntoIterator<Item = S>) -> Filter {
    ignore(accept_method(methods))
}

// ── Status ────────────────────────────────────────────────────────────────────

pub fn accept_status(statuses: impl IntoIterator<Item = u16>) -> Filter {
    let statuses: Vec<u16> = statuses.into_iter().collect();
    Filter::new(move |_, res| statuses.contains(&res.status))
}

pub fn ignore_status(statuses: impl IntoIterator<Item = u16>) -> Filter {
    ignore(accept_status(statuses))
}

macro_rules! status_bound {
    ($($accept:ident / $ignore:ident => $op:tt),* $(,)?) => {
        $(
            pub fn $accept(status: u16) -> Filter {
                Filter::new(move |_, res| res.status $op status)
            }

            pub fn $ignore(status: u16) -> Filter {
                ignore($accept(status))
            }
        )*
    };
}

status_bound! {
    accept_status_greater_than / ignore_status_greater_than => >,
    accept_status_greater_than_or_equal / ignore_status_greater_than_or_equal => >=,
    accept_status_less_than / ignore_status_less_than => <,
    accept_status_less_than_or_equal / ignore_status_less_than_or_equal => <=,
}

// ── Path and host ─────────────────────────────────────────────────────────────

macro_rules! text_filters {
    ($field:ident: $($accept:ident / $ignore:ident => |$value:ident, $probe:ident| $test:expr),* $(,)?) => {
        $(
            pub fn $accept<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Filter {
                let values = owned(values);
                Filter::new(move |req, _| {
                    let $value = req.$field.as_str();
                    values.iter().any(|$probe| $test)
                })
            }

            pub fn $ignore<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Filter {
                ignore($accept(values))
            }
        )*
    };
}

text_filters! { path:
    accept_path / ignore_path => |path, p| path == p,
    accept_path_contains / ignore_path_contains => |path, p| path.contains(p.as_str()),
    accept_path_prefix / ignore_path_prefix => |path, p| path.starts_with(p.as_str()),
    accept_path_suffix / ignore_path_suffix => |path, p| path.ends_with(p.as_str()),
}

text_filters! { host:
    accept_host / ignore_host => |host, h| host == h,
    accept_host_contains / ignore_host_contains => |host, h| host.contains(h.as_str()),
    accept_host_prefix / ignore_host_prefix => |host, h| host.starts_with(h.as_str()),
    accept_host_suffix / ignore_host_suffix => |host, h| host.ends_with(h.as_str()),
}

pub fn accept_path_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    let patterns: Vec<Regex> = patterns.into_iter().collect();
    Filter::new(move |req, _| patterns.iter().any(|re| re.is_match(&req.path)))
}

pub fn ignore_path_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    ignore(accept_path_match(patterns))
}

pub fn accept_host_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    let patterns: Vec<Regex> = patterns.into_iter().collect();
    Filter::new(move |req, _| patterns.iter().any(|re| re.is_match(&req.host)))
}

pub fn ignore_host_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    ignore(accept_host_match(patterns))
}
