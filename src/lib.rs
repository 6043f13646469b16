//! usage-dns - A DNS service answering software version queries.
//!
//! This crate provides a DNS server that lets client software discover the
//! latest release of a project with nothing but a DNS lookup, while the
//! service reports each query to a usage-analytics backend. Clients need no
//! HTTP client or TLS stack; a plain, firewall-friendly DNS query carries
//! both the telemetry (which version is installed where) and the answer
//! (which version is current).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          usage-dns                             │
//! │                                                                │
//! │   UDP/TCP :53 ──▶ ┌───────────────┐    ┌──────────────────┐    │
//! │                   │ UsageHandler  │───▶│ ReleaseResolver  │──▶ registry
//! │                   │ (query codec) │    │ (latest release) │    │
//! │                   └──────┬────────┘    └──────────────────┘    │
//! │                          │ fire-and-forget                     │
//! │                          ▼                                     │
//! │                   ┌───────────────┐    periodic flush          │
//! │                   │ UsageReporter │───────────────────────▶ analytics
//! │                   │ (batching)    │                            │
//! │                   └───────────────┘                            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Query resolution
//!
//! ```text
//! 1.2.0.widget.v1.usage.example.com
//!   → decode (project "widget", installed version "1.2.0")
//!   → resolve latest release of "widget" from the registry
//!   → enqueue a usage event (widget, 1.2.0, client address)
//!   → answer: latest.widget.v1.usage.example.com. 0 IN PTR
//!             2.0.0.widget.v1.usage.example.com.
//! ```
//!
//! Malformed names and unreleased projects answer NXDOMAIN; registry
//! outages answer SERVFAIL. Usage reporting is best-effort and never
//! affects the response.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use usage_dns::{Config, UsageServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: Config = load_config();
//!
//!     let shutdown = CancellationToken::new();
//!     let server = UsageServer::new(config);
//!     server.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod registry;
pub mod reporter;
pub mod server;
pub mod telemetry;

// Re-export main types
pub use codec::{ProjectVersion, QueryCodec, LATEST, SCHEME_V1};
pub use config::{AnalyticsConfig, Config, DnsConfig, RegistryConfig, TelemetryConfig};
pub use error::{DecodeError, ResolveError, ServiceError, TrackError};
pub use handler::UsageHandler;
pub use registry::{GithubReleaseResolver, ReleaseResolver};
pub use reporter::{EventSink, HttpEventSink, TrackingEvent, UsageReporter};
pub use server::UsageServer;
