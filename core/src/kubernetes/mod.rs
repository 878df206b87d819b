//! Kubernetes-facing types for the forwarding control plane.
//!
//! This module provides:
//! - The minimal pod object model seen on watch streams
//! - The tracked-image set consulted before auto-forwarding
//! - Watch events, the watch-source trait, and the stream aggregator

pub mod images;
pub mod models;
pub mod watcher;

// Re-export commonly used types
pub use images::ImageList;
pub use models::{Container, ContainerPort, ObjectMeta, Pod, PodPhase, PodSpec, PodStatus};
pub use watcher::{
    AggregatorStop, PodSelector, PodWatchAggregator, PodWatchSource, WatchEvent, WatchObject,
};
