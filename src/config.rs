//! Configuration types for usage-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::ServiceError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Upstream release registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Usage analytics backend configuration.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Check required settings before any socket is bound.
    ///
    /// Missing registry/analytics identifiers are fatal startup conditions,
    /// never per-query errors.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut missing = Vec::new();
        if self.registry.owner.is_empty() {
            missing.push("registry.owner");
        }
        if self.analytics.project_id.is_empty() {
            missing.push("analytics.project_id");
        }
        if self.analytics.write_key.is_empty() {
            missing.push("analytics.write_key");
        }
        if !missing.is_empty() {
            return Err(ServiceError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.dns.zone.trim_matches('.').is_empty() {
            return Err(ServiceError::Config("dns.zone must not be empty".into()));
        }
        if self.analytics.flush_interval_secs == 0 {
            return Err(ServiceError::Config(
                "analytics.flush_interval_secs must be at least 1".into(),
            ));
        }
        if self.analytics.max_pending == 0 {
            return Err(ServiceError::Config(
                "analytics.max_pending must be at least 1".into(),
            ));
        }
        if self.registry.timeout_secs == 0 {
            return Err(ServiceError::Config(
                "registry.timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Zone the service answers for (e.g., "usage.example.com").
    /// Queries are `<version>.<project>.v1.<zone>`.
    #[serde(default = "default_zone")]
    pub zone: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            zone: default_zone(),
        }
    }
}

/// Upstream release registry (GitHub) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Owner/namespace the queried projects live under. Required.
    #[serde(default)]
    pub owner: String,

    /// Access token. Optional; anonymous access is a valid configuration.
    #[serde(default)]
    pub token: Option<String>,

    /// Registry API base URL.
    #[serde(default = "default_registry_api_url")]
    pub api_url: String,

    /// Per-request timeout for latest-release lookups, in seconds.
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            token: None,
            api_url: default_registry_api_url(),
            timeout_secs: default_registry_timeout(),
        }
    }
}

/// Usage analytics backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Analytics project identifier. Required.
    #[serde(default)]
    pub project_id: String,

    /// Write credential for the analytics project. Required.
    #[serde(default)]
    pub write_key: String,

    /// Analytics API base URL.
    #[serde(default = "default_analytics_api_url")]
    pub api_url: String,

    /// Event collection name batches are posted under.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Interval between batch flushes, in seconds.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Maximum number of pending events held between flushes; further
    /// events are dropped until the next flush.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            write_key: String::new(),
            api_url: default_analytics_api_url(),
            collection: default_collection(),
            flush_interval_secs: default_flush_interval(),
            max_pending: default_max_pending(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "usage_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_zone() -> String {
    "usage.example.com".to_string()
}

fn default_registry_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_registry_timeout() -> u64 {
    5
}

fn default_analytics_api_url() -> String {
    "https://api.keen.io".to_string()
}

fn default_collection() -> String {
    "usage".to_string()
}

fn default_flush_interval() -> u64 {
    1
}

fn default_max_pending() -> usize {
    8192
}

fn default_log_level() -> String {
    "info".to_string()
}
