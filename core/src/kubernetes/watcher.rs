//! Pod watch events and stream aggregation.
//!
//! A watch source produces raw change notifications per selector. The
//! aggregator merges any number of subscriptions into a single bounded
//! channel for one consumer, preserving per-source order, and owns the
//! lifetime of the pump tasks (start all, stop all). It does not interpret
//! or retry anything on behalf of its caller.

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::models::Pod;
use crate::error::{Error, Result};

/// The object carried by a watch event.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchObject {
    Pod(Pod),
    /// Some other resource kind; the forwarding logic ignores these.
    Other { kind: String },
}

/// A single change notification from a watch source.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(WatchObject),
    Modified(WatchObject),
    Deleted(WatchObject),
    /// The source reported an error condition in-stream.
    Error(String),
}

impl WatchEvent {
    /// Decodes one line of the Kubernetes watch wire format:
    /// `{"type": "ADDED", "object": {...}}`.
    pub fn from_json_line(line: &str) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct RawEvent {
            #[serde(rename = "type")]
            event_type: String,
            object: serde_json::Value,
        }

        let raw: RawEvent = serde_json::from_str(line)?;
        if raw.event_type == "ERROR" {
            return Ok(Self::Error(raw.object.to_string()));
        }

        let kind = raw
            .object
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or("Pod")
            .to_string();
        let object = if kind == "Pod" {
            WatchObject::Pod(serde_json::from_value(raw.object)?)
        } else {
            WatchObject::Other { kind }
        };

        match raw.event_type.as_str() {
            "ADDED" => Ok(Self::Added(object)),
            "MODIFIED" => Ok(Self::Modified(object)),
            "DELETED" => Ok(Self::Deleted(object)),
            other => Err(Error::WatchSource(format!(
                "unknown watch event type {other:?}"
            ))),
        }
    }
}

/// Scope of one watch subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSelector {
    pub namespace: String,
    pub label_selector: Option<String>,
}

impl PodSelector {
    /// Selects all pods in a namespace.
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            label_selector: None,
        }
    }
}

/// The underlying watch capability, supplied by the cluster client.
///
/// Each subscription delivers its events on its own channel; the sender side
/// closing the channel ends that subscription's contribution.
pub trait PodWatchSource: Send + Sync {
    fn subscribe(&self, selector: &PodSelector) -> Result<mpsc::Receiver<WatchEvent>>;
}

/// Stops a running aggregator. Idempotent; dropping it also stops.
#[derive(Debug)]
pub struct AggregatorStop {
    shutdown: watch::Sender<bool>,
}

impl AggregatorStop {
    /// Signals every pump task to exit. Safe to call repeatedly, and safe
    /// even if no event was ever consumed.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Merges pod watch subscriptions into one ordered event channel.
pub struct PodWatchAggregator;

impl PodWatchAggregator {
    /// Subscribes to every selector and starts one pump task per
    /// subscription, all feeding the returned channel.
    ///
    /// A subscription that fails at start aborts the whole start call; a
    /// subscription that fails later only ends its own contribution.
    pub fn start<S: PodWatchSource>(
        source: &S,
        selectors: &[PodSelector],
        buffer: usize,
    ) -> Result<(mpsc::Receiver<WatchEvent>, AggregatorStop)> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Subscribe everything up front so a failure leaves no pump running.
        let mut subscriptions = Vec::with_capacity(selectors.len());
        for selector in selectors {
            subscriptions.push((selector.namespace.clone(), source.subscribe(selector)?));
        }

        for (namespace, subscription) in subscriptions {
            tokio::spawn(pump(namespace, subscription, tx.clone(), shutdown_rx.clone()));
        }

        Ok((rx, AggregatorStop { shutdown: shutdown_tx }))
    }
}

/// Forwards one subscription's events onto the aggregate channel until the
/// subscription ends, the consumer goes away, or shutdown is signaled.
async fn pump(
    namespace: String,
    mut subscription: mpsc::Receiver<WatchEvent>,
    tx: mpsc::Sender<WatchEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                None => {
                    debug!(namespace = %namespace, "watch subscription ended");
                    break;
                }
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    if *shutdown_rx.borrow() {
        debug!(namespace = %namespace, "watch pump stopped");
    } else {
        warn!(namespace = %namespace, "watch pump exited before shutdown");
    }
}
