//! W3C `traceparent` parsing.
//!
//! Only the fields the request log needs are kept: trace id, parent span id
//! and flags. Anything malformed yields `None` and the log record simply
//! omits the ids.

use http::HeaderMap;

pub const TRACEPARENT_HEADER: &str = "traceparent";

/// A parsed `00-<trace-id>-<span-id>-<flags>` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceParent {
    pub trace_id: String,
    pub span_id: String,
    pub flags: u8,
}

impl TraceParent {
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (version, trace_id, span_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || version != "00" {
            return None;
        }
        if !is_id(trace_id, 32) || !is_id(span_id, 16) || flags.len() != 2 {
            return None;
        }
        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            span_id: span_id.to_ascii_lowercase(),
            flags: u8::from_str_radix(flags, 16).ok()?,
        })
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers.get(TRACEPARENT_HEADER)?.to_str().ok().and_then(Self::parse)
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & 0x01 == 0x01
    }
}

/// Hex of the right length and not all zeros, which the format reserves as
/// invalid.
fn is_id(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit()) && s.bytes().any(|b| b != b'0')
}
