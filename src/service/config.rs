//! Service settings read from the environment.

use std::net::SocketAddr;

/// Where and as what this service runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub environment: String,
    pub region: String,
    pub port: u16,
}

impl ServiceConfig {
    /// Reads `SERVICE_NAME`, `APP_ENV` and `AWS_REGION`.
    pub fn from_env(port: u16) -> Self {
        Self::from_lookup(port, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(port: u16, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            name: or_default(lookup("SERVICE_NAME"), "no_service_name_set"),
            environment: or_default(lookup("APP_ENV"), "local"),
            region: or_default(lookup("AWS_REGION"), "local"),
            port,
        }
    }

    /// All interfaces on the configured port.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// An unset or empty variable falls back to `default`.
pub(crate) fn or_default(value: Option<String>, default: &str) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_owned())
}
