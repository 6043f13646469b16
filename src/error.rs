//! Error types for usage-dns.

use thiserror::Error;

/// Errors that can occur while starting or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// IO error (socket bind, network, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),
}

/// A query name that does not match the v1 encoding scheme.
///
/// Every variant carries the offending name so the failure can be logged
/// with context; the response-level outcome is uniformly NXDOMAIN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Name does not end with the service zone.
    #[error("name outside service zone: {0}")]
    OutsideZone(String),

    /// Scheme tag label is not a supported scheme version.
    #[error("unsupported scheme tag {tag:?} in {name}")]
    UnknownScheme {
        /// The full query name.
        name: String,
        /// The label found where the scheme tag belongs.
        tag: String,
    },

    /// Not enough labels for version + project + scheme tag.
    #[error("too few labels in {0}")]
    TooFewLabels(String),

    /// Project label parsed empty.
    #[error("empty project in {0}")]
    EmptyProject(String),

    /// Version parsed empty.
    #[error("empty version in {0}")]
    EmptyVersion(String),
}

/// Failure to obtain the latest release for a project.
///
/// The handler maps all variants to a negative answer, but the shapes stay
/// distinct: absence (`NotFound`, `NoReleases`) is NXDOMAIN while
/// infrastructure trouble (`Upstream`, `Status`) is SERVFAIL.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Transport-level failure talking to the registry (includes timeouts).
    #[error("registry request for {project} failed: {source}")]
    Upstream {
        /// Project being resolved.
        project: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// Registry answered with an unexpected HTTP status.
    #[error("registry returned status {status} for {project}")]
    Status {
        /// Project being resolved.
        project: String,
        /// HTTP status code.
        status: u16,
    },

    /// Registry has no such project, or the project has no releases yet.
    /// The upstream 404 does not let us tell these apart.
    #[error("no released project {project}")]
    NotFound {
        /// Project being resolved.
        project: String,
    },

    /// Registry answered successfully but the release carries no tag.
    #[error("no release tag for {project}")]
    NoReleases {
        /// Project being resolved.
        project: String,
    },
}

/// Failure in the usage-tracking path. Always non-fatal to query handling.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The pending buffer is at capacity; the event was dropped.
    #[error("pending event buffer full ({capacity} events)")]
    BufferFull {
        /// Configured buffer capacity.
        capacity: usize,
    },

    /// Transport-level failure delivering a batch.
    #[error("analytics request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Analytics backend answered with a non-success status.
    #[error("analytics backend returned status {0}")]
    Status(u16),

    /// A batch could not be serialized.
    #[error("failed to serialize event batch: {0}")]
    Serialize(#[from] serde_json::Error),
}
