//! The v1 query name scheme.
//!
//! A query encodes a project and a version as DNS labels under the service
//! zone, with a scheme tag between the project and the zone:
//!
//! ```text
//! 1.2.0.widget.v1.usage.example.com.
//! └─┬─┘ └──┬─┘ ├┘ └───────┬───────┘
//! version project tag    zone
//! ```
//!
//! The version may span any number of labels (`1.2.0` is three). The
//! reserved version `latest` asks for the newest release without reporting
//! an installed one; it is also the owner name of every answer, so a client
//! can query `latest.widget.v1.usage.example.com` and follow the returned
//! pointer.
//!
//! Both directions are pure string functions: no I/O, no partial values.

use crate::error::DecodeError;

/// Label identifying the first (and so far only) scheme version.
pub const SCHEME_V1: &str = "v1";

/// Reserved version value meaning "no installed version, give me the newest".
pub const LATEST: &str = "latest";

/// A project identifier paired with a version tag.
///
/// Both fields are non-empty for any value produced by
/// [`QueryCodec::decode`]; nothing mutates one after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectVersion {
    /// Project identifier, matched against upstream registry identifiers.
    pub project: String,
    /// Installed version reported by the client, or [`LATEST`].
    pub version: String,
}

impl ProjectVersion {
    /// Convenience constructor.
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
        }
    }

    /// The canonical "latest" form for the same project.
    pub fn latest(&self) -> Self {
        Self::new(self.project.clone(), LATEST)
    }
}

impl std::fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.project, self.version)
    }
}

/// Bidirectional mapping between query names and [`ProjectVersion`] values
/// for a fixed zone.
#[derive(Debug, Clone)]
pub struct QueryCodec {
    /// Normalized zone: lowercase, no leading/trailing dots.
    zone: String,
}

impl QueryCodec {
    /// Create a codec for the given zone. The zone is normalized to
    /// lowercase without surrounding dots.
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.trim_matches('.').to_ascii_lowercase(),
        }
    }

    /// The normalized zone this codec serves.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Parse a query name into a [`ProjectVersion`].
    ///
    /// The zone suffix and scheme tag match case-insensitively (DNS names
    /// are); the version and project labels are preserved as written. Any
    /// structural mismatch is a [`DecodeError`] naming the offending part.
    pub fn decode(&self, name: &str) -> Result<ProjectVersion, DecodeError> {
        let trimmed = name.trim_end_matches('.');
        let lowered = trimmed.to_ascii_lowercase();

        if lowered == self.zone {
            return Err(DecodeError::TooFewLabels(trimmed.to_string()));
        }

        let suffix = format!(".{}", self.zone);
        if !lowered.ends_with(&suffix) {
            return Err(DecodeError::OutsideZone(trimmed.to_string()));
        }

        // ASCII lowercasing preserves byte offsets, so the suffix position
        // in `lowered` is valid in `trimmed` as well.
        let head = &trimmed[..trimmed.len() - suffix.len()];
        let labels: Vec<&str> = head.split('.').collect();

        if labels.len() < 3 {
            return Err(DecodeError::TooFewLabels(trimmed.to_string()));
        }

        let tag = labels[labels.len() - 1];
        if !tag.eq_ignore_ascii_case(SCHEME_V1) {
            return Err(DecodeError::UnknownScheme {
                name: trimmed.to_string(),
                tag: tag.to_string(),
            });
        }

        let project = labels[labels.len() - 2];
        if project.is_empty() {
            return Err(DecodeError::EmptyProject(trimmed.to_string()));
        }

        let version = labels[..labels.len() - 2].join(".");
        if version.is_empty() {
            return Err(DecodeError::EmptyVersion(trimmed.to_string()));
        }

        Ok(ProjectVersion {
            project: project.to_string(),
            version,
        })
    }

    /// Format a [`ProjectVersion`] as an absolute query name
    /// (`<version>.<project>.v1.<zone>.`).
    ///
    /// Exact structural inverse of [`QueryCodec::decode`] for any value
    /// decode can produce.
    pub fn encode(&self, pv: &ProjectVersion) -> String {
        format!(
            "{}.{}.{}.{}.",
            pv.version, pv.project, SCHEME_V1, self.zone
        )
    }
}
