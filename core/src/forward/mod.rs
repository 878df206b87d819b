//! Forwarding control plane: port allocation, entry lifecycle, and the
//! pod-watch consumption loop.
//!
//! The entry manager owns every registry (taken ports, live entries,
//! forwarded resource versions); nothing else mutates them. The actual
//! byte-level tunnel is behind the [`Forwarder`] trait and supplied by the
//! hosting tool.

pub mod allocator;
pub mod entry;
pub mod entry_manager;
pub mod pod_forwarder;

use std::future::Future;

use crate::error::Result;

pub use allocator::{PortAllocator, PortPool};
pub use entry::{ForwardState, ForwardingEntry, ForwardingTarget};
pub use entry_manager::EntryManager;
pub use pod_forwarder::{ForwarderHandle, WatchingPodForwarder};

/// The forwarding backend capability (external collaborator).
///
/// Implementations establish a tunnel from `entry.local_port` to the target
/// container port. Establishing a tunnel can block on cluster round-trips,
/// so the entry manager bounds every `forward` call with the configured
/// readiness timeout.
pub trait Forwarder: Send + Sync {
    /// Begins (or re-establishes, on a resource-version update) a tunnel
    /// for the entry. Resolves once the session is ready.
    fn forward(&self, entry: &ForwardingEntry) -> impl Future<Output = Result<()>> + Send;

    /// Tears down a previously forwarded session. Must be safe to call on
    /// an entry that was never successfully forwarded.
    fn terminate(&self, entry: &ForwardingEntry) -> impl Future<Output = ()> + Send;
}
