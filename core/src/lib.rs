//! PortSync Core Library
//!
//! Port-forwarding control plane for interactive development sessions.
//! Keeps a local machine's ports synchronized with ports exposed by
//! containers in a remote cluster:
//! - Aggregate pod watch streams into one ordered event channel
//! - Track forwarding entries through their lifecycle (create, update,
//!   skip stale, terminate) without local port collisions
//! - Allocate collision-free local ports, sticky per target for a session
//! - Classify failures into user-facing diagnostics
//!
//! The byte-level tunnel itself, the cluster watch client, and the set of
//! session-built images are external collaborators, supplied through the
//! [`forward::Forwarder`] and [`kubernetes::PodWatchSource`] traits and the
//! [`kubernetes::ImageList`].

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod forward;
pub mod kubernetes;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the primary API
pub use config::ForwardSettings;
pub use diagnostics::{classify, Diagnostic, Phase, StatusCode};
pub use error::{Error, Result};
pub use forward::{
    EntryManager, ForwardState, Forwarder, ForwarderHandle, ForwardingEntry, ForwardingTarget,
    PortAllocator, PortPool, WatchingPodForwarder,
};
pub use kubernetes::{ImageList, PodSelector, PodWatchAggregator, PodWatchSource, WatchEvent};
