//! Forwarding-entry registries and lifecycle decisions.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::allocator::PortAllocator;
use super::entry::{ForwardState, ForwardingEntry, ForwardingTarget};
use super::Forwarder;
use crate::config::ForwardSettings;
use crate::error::{Error, Result};

/// State owned exclusively by the entry manager. One lock guards all three
/// registries so `process_target` and `release_target` are atomic with
/// respect to each other for a given key.
#[derive(Default)]
struct Registries {
    /// Live entries by key. At most one per key.
    entries: HashMap<String, ForwardingEntry>,
    /// Local ports currently claimed by a live entry.
    forwarded_ports: HashSet<u16>,
    /// Resource version most recently handed to the backend, per key.
    /// Staleness decisions only; no port bookkeeping.
    forwarded_resources: HashMap<String, i64>,
}

/// Decides create/update/skip/terminate for every observed target and
/// drives the forwarding backend.
pub struct EntryManager<F> {
    forwarder: F,
    allocator: PortAllocator,
    settings: ForwardSettings,
    registries: Mutex<Registries>,
}

impl<F: Forwarder> EntryManager<F> {
    pub fn new(forwarder: F, allocator: PortAllocator, settings: ForwardSettings) -> Self {
        Self {
            forwarder,
            allocator,
            settings,
            registries: Mutex::new(Registries::default()),
        }
    }

    /// Manager with the allocator derived from the settings' ephemeral
    /// scan window. The constructor hosting tools normally use.
    pub fn from_settings(forwarder: F, settings: ForwardSettings) -> Self {
        let allocator = PortAllocator::from_settings(&settings);
        Self::new(forwarder, allocator, settings)
    }

    pub fn settings(&self) -> &ForwardSettings {
        &self.settings
    }

    /// Processes one observed forwarding target.
    ///
    /// First observation of a key allocates a local port and forwards; a
    /// strictly newer resource version restarts the backend session on the
    /// same local port; an equal-or-older version is a no-op. The attempt
    /// is bookkept in the forwarded-resource registry whether or not the
    /// backend succeeds, so duplicate events are not retried on a hot loop.
    pub async fn process_target(&self, target: ForwardingTarget) -> Result<()> {
        let version = target
            .parsed_resource_version()
            .ok_or_else(|| Error::InvalidResourceVersion {
                pod: target.pod_name.clone(),
                version: target.resource_version.clone(),
            })?;
        let key = target.key();

        let mut regs = self.registries.lock().await;

        if let Some(&recorded) = regs.forwarded_resources.get(&key) {
            if recorded >= version {
                debug!(key = %key, version, recorded, "stale or duplicate target, skipping");
                return Ok(());
            }
        }

        match regs.entries.remove(&key) {
            Some(mut entry) => {
                // Newer resource version: restart the backend session but
                // keep the local port a client may already be connected to.
                self.forwarder.terminate(&entry).await;
                entry.target.resource_version = target.resource_version.clone();
                entry.state = ForwardState::Pending;
                info!(entry = %entry, version, "re-forwarding updated target");

                regs.forwarded_resources.insert(key.clone(), version);
                regs.entries.insert(key.clone(), entry.clone());

                let result = self.establish(&mut entry).await;
                regs.entries.insert(key, entry);
                result
            }
            None => {
                let local_port = self
                    .allocator
                    .allocate(target.container_port, &regs.forwarded_ports)?;
                regs.forwarded_ports.insert(local_port);

                let mut entry = ForwardingEntry::new(target, local_port);
                info!(entry = %entry, version, "forwarding new target");

                regs.forwarded_resources.insert(key.clone(), version);
                regs.entries.insert(key.clone(), entry.clone());

                let result = self.establish(&mut entry).await;
                regs.entries.insert(key, entry);
                result
            }
        }
    }

    /// Removes the entry for a key, frees its local port, and tears down
    /// the backend session. No-op for unknown keys.
    pub async fn release_target(&self, key: &str) -> Option<ForwardingEntry> {
        let mut regs = self.registries.lock().await;
        let entry = regs.entries.remove(key)?;
        regs.forwarded_ports.remove(&entry.local_port);
        regs.forwarded_resources.remove(key);
        info!(entry = %entry, "releasing forwarded target");
        self.forwarder.terminate(&entry).await;
        Some(entry)
    }

    /// Releases every entry owned by a pod. Invoked when the pod is
    /// deleted or stops matching the session's tracked targets.
    pub async fn release_pod(&self, namespace: &str, pod_name: &str) {
        let mut regs = self.registries.lock().await;
        let keys: Vec<String> = regs
            .entries
            .values()
            .filter(|e| e.target.namespace == namespace && e.target.pod_name == pod_name)
            .map(ForwardingEntry::key)
            .collect();

        for key in keys {
            if let Some(entry) = regs.entries.remove(&key) {
                regs.forwarded_ports.remove(&entry.local_port);
                regs.forwarded_resources.remove(&key);
                info!(entry = %entry, "releasing entry for deleted pod");
                self.forwarder.terminate(&entry).await;
            }
        }
    }

    /// Best-effort shutdown: terminates every live backend session,
    /// including entries never confirmed ready, and clears all registries.
    pub async fn terminate_all(&self) {
        let mut regs = self.registries.lock().await;
        let entries: Vec<ForwardingEntry> = regs.entries.drain().map(|(_, e)| e).collect();
        regs.forwarded_ports.clear();
        regs.forwarded_resources.clear();
        drop(regs);

        for entry in entries {
            debug!(entry = %entry, "terminating on shutdown");
            self.forwarder.terminate(&entry).await;
        }
    }

    /// Snapshot of all live entries.
    pub async fn entries(&self) -> Vec<ForwardingEntry> {
        self.registries.lock().await.entries.values().cloned().collect()
    }

    /// Snapshot of one entry by key.
    pub async fn entry(&self, key: &str) -> Option<ForwardingEntry> {
        self.registries.lock().await.entries.get(key).cloned()
    }

    /// Snapshot of the local ports currently claimed.
    pub async fn forwarded_ports(&self) -> HashSet<u16> {
        self.registries.lock().await.forwarded_ports.clone()
    }

    /// Resource version last handed to the backend for a key, if any.
    pub async fn recorded_resource_version(&self, key: &str) -> Option<i64> {
        self.registries.lock().await.forwarded_resources.get(key).copied()
    }

    /// Runs the backend forward under the readiness timeout and settles the
    /// entry's lifecycle state from the outcome.
    async fn establish(&self, entry: &mut ForwardingEntry) -> Result<()> {
        let timeout = self.settings.forward_timeout();
        let result = match tokio::time::timeout(timeout, self.forwarder.forward(entry)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::ForwardNotReady {
                key: entry.key(),
                timeout,
            }),
        };

        match &result {
            Ok(()) => entry.state = ForwardState::Active,
            Err(err) => {
                entry.state = ForwardState::Failed;
                warn!(entry = %entry, error = %err, "forward attempt failed");
            }
        }
        result
    }
}
