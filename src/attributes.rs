//! Structured log attributes and the per-request accumulator.
//!
//! Handlers describe what they did by adding [`Attr`]s to the request's
//! [`Attributes`]. The logging middleware drains them once the downstream
//! chain returns and appends them, in insertion order, after its own
//! `request` and `response` groups.
//!
//! ```rust
//! use vigil::{Attr, Attributes};
//!
//! let attrs = Attributes::new();
//! attrs.add(Attr::group("checkout", [
//!     Attr::new("items", 3u64),
//!     Attr::new("currency", "EUR"),
//! ]));
//!
//! let drained = attrs.drain();
//! assert_eq!(drained[0].key(), "checkout");
//! assert!(attrs.is_empty());
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

// ── Value ─────────────────────────────────────────────────────────────────────

/// The value half of an [`Attr`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Time(DateTime<Utc>),
    List(Vec<Value>),
    Group(Vec<Attr>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Members of a group value, in insertion order.
    pub fn as_group(&self) -> Option<&[Attr]> {
        match self {
            Self::Group(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Looks up a direct member of a group value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_group()?.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    /// Renders the value as compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(v) => s.serialize_str(v),
            Self::Int(v) => s.serialize_i64(*v),
            Self::Uint(v) => s.serialize_u64(*v),
            Self::Float(v) => s.serialize_f64(*v),
            Self::Bool(v) => s.serialize_bool(*v),
            Self::Duration(d) => s.collect_str(&format_args!("{d:?}")),
            Self::Time(t) => s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::List(items) => s.collect_seq(items),
            // Groups keep insertion order, unlike a serde_json::Map.
            Self::Group(attrs) => s.collect_map(attrs.iter().map(|a| (&a.key, &a.value))),
        }
    }
}

/// Strings print bare; everything else prints as JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => f.write_str(&other.to_json()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v as $target)
                }
            }
        )*
    };
}

value_from! {
    i32   => Int as i64,
    i64   => Int as i64,
    u16   => Uint as u64,
    u32   => Uint as u64,
    u64   => Uint as u64,
    usize => Uint as u64,
    f64   => Float as f64,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::Str(v.to_owned()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::Str(v) }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self { Self::Str(v.clone()) }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self { Self::Duration(v) }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self { Self::Time(v) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

// ── Attr ──────────────────────────────────────────────────────────────────────

/// A named value attached to a log record. A group is an `Attr` whose value
/// is [`Value::Group`].
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    key: String,
    value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// A named group of attributes. Member order is preserved.
    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Attr>) -> Self {
        Self { key: key.into(), value: Value::Group(attrs.into_iter().collect()) }
    }

    pub fn key(&self) -> &str { &self.key }
    pub fn value(&self) -> &Value { &self.value }
}

// ── Attributes ────────────────────────────────────────────────────────────────

/// Per-request attribute accumulator.
///
/// Every [`Request`](crate::Request) owns a fresh one. Clones share the same
/// list, so a handler can hand a clone to sub-tasks it spawns; appends from
/// those tasks are serialised by a mutex and land in the same record.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    inner: Arc<Mutex<Vec<Attr>>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `attr` after everything added so far.
    pub fn add(&self, attr: Attr) {
        self.lock().push(attr);
    }

    /// Takes every accumulated attribute, oldest first, leaving the list empty.
    pub fn drain(&self) -> Vec<Attr> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking appender cannot leave a half-written Vec behind, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Attr>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
