//! Fakes and fixtures shared by the unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::ForwardSettings;
use crate::error::{Error, Result};
use crate::forward::{Forwarder, ForwardingEntry, ForwardingTarget};
use crate::kubernetes::{
    Container, ContainerPort, ObjectMeta, Pod, PodPhase, PodSelector, PodSpec, PodStatus,
    PodWatchSource, WatchEvent,
};

/// Settings with the short readiness timeout the async tests rely on.
pub fn settings_500ms() -> ForwardSettings {
    ForwardSettings {
        forward_timeout_ms: 500,
        ..ForwardSettings::default()
    }
}

/// A bare target, fields in registry-key order plus the pod and version.
pub fn target(
    namespace: &str,
    pod_name: &str,
    container_name: &str,
    port_name: &str,
    container_port: u16,
    resource_version: &str,
) -> ForwardingTarget {
    ForwardingTarget {
        namespace: namespace.into(),
        pod_name: pod_name.into(),
        container_name: container_name.into(),
        port_name: port_name.into(),
        container_port,
        resource_version: resource_version.into(),
        automatic: true,
    }
}

/// A running pod with no containers, for watch plumbing tests.
pub fn running_pod(name: &str, resource_version: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: name.into(),
            namespace: "default".into(),
            resource_version: resource_version.into(),
        },
        spec: PodSpec::default(),
        status: PodStatus {
            phase: PodPhase::Running,
        },
    }
}

/// The canonical test pod: `mycontainer` running `image`, port
/// `myport`/8080, in namespace `default`.
pub fn running_pod_with_port(resource_version: &str) -> Pod {
    pod_named_with_port("podname", resource_version, 8080)
}

/// Same shape as [`running_pod_with_port`] with a custom name and port.
pub fn pod_named_with_port(name: &str, resource_version: &str, port: u16) -> Pod {
    let mut pod = running_pod(name, resource_version);
    pod.spec.containers.push(Container {
        name: "mycontainer".into(),
        image: "image".into(),
        ports: vec![ContainerPort {
            name: Some("myport".into()),
            container_port: port,
        }],
    });
    pod
}

/// Polls a predicate until it holds or a second has passed.
pub async fn eventually<F: FnMut() -> bool>(mut predicate: F) -> bool {
    for _ in 0..100 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ============================================================================
// Fake watch source
// ============================================================================

/// Channel-backed watch source. Each `subscribe` call hands out a fresh
/// channel; tests push events by subscription index.
#[derive(Clone, Default)]
pub struct FakeWatchSource {
    senders: Arc<Mutex<Vec<Option<mpsc::Sender<WatchEvent>>>>>,
    fail_on: Option<usize>,
}

impl FakeWatchSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose nth `subscribe` call (zero-based) fails.
    pub fn failing_on(index: usize) -> Self {
        Self {
            fail_on: Some(index),
            ..Self::default()
        }
    }

    /// Sends an event on the nth subscription, in subscribe order.
    pub fn emit_to(&self, index: usize, event: WatchEvent) {
        let senders = self.senders.lock();
        senders[index]
            .as_ref()
            .expect("subscription already closed")
            .try_send(event)
            .expect("fake watch channel full");
    }

    /// Ends the nth subscription, as a failed watch would.
    pub fn close(&self, index: usize) {
        self.senders.lock()[index] = None;
    }

    /// Whether the nth subscription's receiver has been dropped.
    pub fn is_closed(&self, index: usize) -> bool {
        let senders = self.senders.lock();
        match &senders[index] {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }
}

impl PodWatchSource for FakeWatchSource {
    fn subscribe(&self, selector: &PodSelector) -> Result<mpsc::Receiver<WatchEvent>> {
        let mut senders = self.senders.lock();
        if self.fail_on == Some(senders.len()) {
            return Err(Error::WatchSource(format!(
                "subscribe refused for namespace {}",
                selector.namespace
            )));
        }
        let (tx, rx) = mpsc::channel(16);
        senders.push(Some(tx));
        Ok(rx)
    }
}

// ============================================================================
// Recording forwarder
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Succeed,
    Fail,
    Hang,
}

#[derive(Default)]
struct Recorded {
    forward_calls: usize,
    terminate_calls: usize,
    keys: HashSet<String>,
    ports: HashSet<u16>,
}

/// Backend fake that records every forward/terminate it receives.
#[derive(Clone)]
pub struct RecordingForwarder {
    mode: Mode,
    reason: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self {
            mode: Mode::Succeed,
            reason: String::new(),
            recorded: Arc::default(),
        }
    }

    /// Every forward attempt fails with the given reason.
    pub fn failing(reason: &str) -> Self {
        Self {
            mode: Mode::Fail,
            reason: reason.into(),
            recorded: Arc::default(),
        }
    }

    /// Forward attempts never signal readiness.
    pub fn hanging() -> Self {
        Self {
            mode: Mode::Hang,
            reason: String::new(),
            recorded: Arc::default(),
        }
    }

    pub fn forward_calls(&self) -> usize {
        self.recorded.lock().forward_calls
    }

    pub fn terminate_calls(&self) -> usize {
        self.recorded.lock().terminate_calls
    }

    pub fn forwarded_ports(&self) -> HashSet<u16> {
        self.recorded.lock().ports.clone()
    }

    pub fn has_forwarded(&self, key: &str) -> bool {
        self.recorded.lock().keys.contains(key)
    }
}

impl Default for RecordingForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder for RecordingForwarder {
    async fn forward(&self, entry: &ForwardingEntry) -> Result<()> {
        if self.mode == Mode::Hang {
            std::future::pending::<()>().await;
        }
        {
            let mut recorded = self.recorded.lock();
            recorded.forward_calls += 1;
            recorded.keys.insert(entry.key());
            recorded.ports.insert(entry.local_port);
        }
        if self.mode == Mode::Fail {
            return Err(Error::ForwardSession {
                key: entry.key(),
                reason: self.reason.clone(),
            });
        }
        Ok(())
    }

    async fn terminate(&self, _entry: &ForwardingEntry) {
        self.recorded.lock().terminate_calls += 1;
    }
}
