//! HTTP method as a typed enum.
//!
//! Covers the RFC 9110 methods plus `PURGE`, which nginx and Varnish use for
//! cache invalidation. Anything else is answered with `405 Method Not
//! Allowed` by the server before routing.

use std::fmt;
use std::str::FromStr;

use crate::error::UnsupportedMethod;

macro_rules! methods {
    ($($variant:ident => $wire:literal),* $(,)?) => {
        /// A known HTTP method.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum Method {
            $($variant,)*
        }

        impl Method {
            /// Returns the uppercase wire representation (e.g. `"GET"`).
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)*
                }
            }
        }

        /// Parses an uppercase method string. Case-sensitive per RFC 9110 §9.1.
        impl FromStr for Method {
            type Err = UnsupportedMethod;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)*
                    other => Err(UnsupportedMethod(other.to_owned())),
                }
            }
        }
    };
}

methods! {
    Connect => "CONNECT",
    Delete  => "DELETE",
    Get     => "GET",
    Head    => "HEAD",
    Options => "OPTIONS",
    Patch   => "PATCH",
    Post    => "POST",
    Purge   => "PURGE",
    Put     => "PUT",
    Trace   => "TRACE",
}

impl Method {
    /// Case-insensitive comparison against a method name, for filters built
    /// from configuration strings.
    pub fn is(self, name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(name)
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = UnsupportedMethod;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
