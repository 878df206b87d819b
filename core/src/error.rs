//! Error types for the portsync-core library.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for portsync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tracking and forwarding container ports.
#[derive(Error, Debug)]
pub enum Error {
    /// A pod carried a resource version that does not parse as an integer.
    ///
    /// The whole pod event is discarded; no registries are modified.
    #[error("invalid resource version {version:?} for pod {pod}")]
    InvalidResourceVersion { pod: String, version: String },

    /// No usable local port was found within the allocator's scan bound.
    #[error("no available local port (preferred {preferred})")]
    PortExhausted { preferred: u16 },

    /// The forwarding backend failed to establish or maintain a tunnel.
    #[error("forward session failed for {key}: {reason}")]
    ForwardSession { key: String, reason: String },

    /// A forward attempt did not signal readiness within the configured wait.
    #[error("forward for {key} not ready after {timeout:?}")]
    ForwardNotReady { key: String, timeout: Duration },

    /// An underlying watch subscription failed.
    #[error("watch source error: {0}")]
    WatchSource(String),

    /// A watch payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the error only affects a single forwarding target.
    ///
    /// Per-target errors must not abort sibling targets of the same pod.
    pub fn is_per_target(&self) -> bool {
        matches!(
            self,
            Self::PortExhausted { .. } | Self::ForwardSession { .. } | Self::ForwardNotReady { .. }
        )
    }
}
