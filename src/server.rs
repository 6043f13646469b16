//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::codec::QueryCodec;
use crate::config::Config;
use crate::error::ServiceError;
use crate::handler::UsageHandler;
use crate::registry::GithubReleaseResolver;
use crate::reporter::{HttpEventSink, UsageReporter};

/// TCP connections idle longer than this are dropped.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Version-query DNS server with batched usage reporting.
pub struct UsageServer {
    config: Config,
}

impl UsageServer {
    /// Create a new server with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the server until the token is cancelled.
    ///
    /// Validates configuration, wires up the resolver and reporter, binds
    /// UDP and TCP on the configured address, and serves queries. On
    /// shutdown the reporter drains its pending events before returning.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        self.config.validate()?;

        info!(
            listen_addr = %self.config.dns.listen_addr,
            zone = %self.config.dns.zone,
            registry_owner = %self.config.registry.owner,
            "Starting usage-dns server"
        );

        let resolver = Arc::new(GithubReleaseResolver::new(&self.config.registry)?);

        let sink = Arc::new(HttpEventSink::new(&self.config.analytics)?);
        let reporter = Arc::new(UsageReporter::new(
            sink,
            Duration::from_secs(self.config.analytics.flush_interval_secs),
            self.config.analytics.max_pending,
        ));

        // One flush loop for the whole process, never one timer per event.
        let flush_handle = tokio::spawn(reporter.clone().run(shutdown.clone()));

        let codec = QueryCodec::new(&self.config.dns.zone);
        let handler = UsageHandler::new(codec, resolver, reporter);

        let mut server = ServerFuture::new(handler);

        let udp_socket = UdpSocket::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!(zone = %self.config.dns.zone, "DNS server ready to serve queries");

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        // Wait for the reporter to drain its final batch.
        let _ = flush_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
