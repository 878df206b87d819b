//! Top-level loop: consumes aggregated pod events and drives the entry
//! manager.
//!
//! Consumption is serialized on one dedicated task, the only steady-state
//! writer into the entry manager. Events for the same pod are therefore
//! processed in delivery order.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::entry::ForwardingTarget;
use super::entry_manager::EntryManager;
use super::Forwarder;
use crate::error::Result;
use crate::kubernetes::{
    ImageList, Pod, PodSelector, PodWatchAggregator, PodWatchSource, WatchEvent, WatchObject,
};

/// Watches pods across the session's selectors and automatically forwards
/// declared container ports of tracked images.
pub struct WatchingPodForwarder<F, S> {
    entry_manager: Arc<EntryManager<F>>,
    images: Arc<ImageList>,
    source: S,
    selectors: Vec<PodSelector>,
}

impl<F, S> WatchingPodForwarder<F, S>
where
    F: Forwarder + Send + Sync + 'static,
    S: PodWatchSource,
{
    pub fn new(
        entry_manager: Arc<EntryManager<F>>,
        images: Arc<ImageList>,
        source: S,
        selectors: Vec<PodSelector>,
    ) -> Self {
        Self {
            entry_manager,
            images,
            source,
            selectors,
        }
    }

    /// Launches the watch aggregator and the consumption loop.
    pub fn start(self) -> Result<ForwarderHandle<F>> {
        let buffer = self.entry_manager.settings().event_buffer;
        let (mut events, aggregator) =
            PodWatchAggregator::start(&self.source, &self.selectors, buffer)?;
        info!(selectors = self.selectors.len(), "pod forwarder started");

        let entry_manager = Arc::clone(&self.entry_manager);
        let images = Arc::clone(&self.images);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handle_event(&entry_manager, &images, event).await;
            }
            debug!("pod event loop ended");
        });

        Ok(ForwarderHandle {
            aggregator,
            task,
            entry_manager: self.entry_manager,
        })
    }
}

/// Running forwarder. Shutdown stops the watch, cancels in-flight work, and
/// tears down every live backend session.
pub struct ForwarderHandle<F> {
    aggregator: crate::kubernetes::AggregatorStop,
    task: JoinHandle<()>,
    entry_manager: Arc<EntryManager<F>>,
}

impl<F: Forwarder> ForwarderHandle<F> {
    /// Stops the aggregator, cancels the consumption loop, and terminates
    /// all live entries best-effort.
    pub async fn shutdown(self) {
        self.aggregator.stop();
        self.task.abort();
        let _ = self.task.await;
        self.entry_manager.terminate_all().await;
        info!("pod forwarder stopped");
    }
}

/// Applies the forwarding rules to one watch event. Nothing here is fatal;
/// the loop keeps consuming after any single target's failure.
async fn handle_event<F: Forwarder>(
    entry_manager: &EntryManager<F>,
    images: &ImageList,
    event: WatchEvent,
) {
    match event {
        WatchEvent::Added(WatchObject::Pod(pod)) | WatchEvent::Modified(WatchObject::Pod(pod)) => {
            if !pod.is_running() {
                debug!(
                    pod = %pod.metadata.name,
                    phase = pod.status.phase.as_str(),
                    "ignoring pod outside Running phase"
                );
                return;
            }
            if let Err(err) = forward_pod(entry_manager, images, &pod).await {
                warn!(pod = %pod.metadata.name, error = %err, "pod event not fully forwarded");
            }
        }
        WatchEvent::Deleted(WatchObject::Pod(pod)) => {
            entry_manager
                .release_pod(&pod.metadata.namespace, &pod.metadata.name)
                .await;
        }
        WatchEvent::Error(message) => {
            warn!(message = %message, "watch stream reported an error");
        }
        // Non-pod objects carry nothing forwardable.
        WatchEvent::Added(_) | WatchEvent::Modified(_) | WatchEvent::Deleted(_) => {}
    }
}

/// Builds a target per declared port of every tracked container and hands
/// each to the entry manager. One failing port does not block its siblings;
/// the call reports the last error encountered.
async fn forward_pod<F: Forwarder>(
    entry_manager: &EntryManager<F>,
    images: &ImageList,
    pod: &Pod,
) -> Result<()> {
    let mut last_error = None;

    for container in &pod.spec.containers {
        if !images.contains(&container.image) {
            debug!(
                container = %container.name,
                image = %container.image,
                "image not tracked by this session, skipping"
            );
            continue;
        }
        for port in &container.ports {
            let target = ForwardingTarget {
                namespace: pod.metadata.namespace.clone(),
                pod_name: pod.metadata.name.clone(),
                container_name: container.name.clone(),
                port_name: port.name.clone().unwrap_or_default(),
                container_port: port.container_port,
                resource_version: pod.metadata.resource_version.clone(),
                automatic: true,
            };
            if let Err(err) = entry_manager.process_target(target).await {
                if !err.is_per_target() {
                    // Malformed pod metadata fails every sibling identically.
                    return Err(err);
                }
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
