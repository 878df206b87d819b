//! Runtime settings for the forwarding control plane.
//!
//! Settings are deserializable so a hosting tool can load them from its own
//! session configuration; every field has a standalone default.

use std::time::Duration;

use serde::Deserialize;

/// Settings governing forward attempts and event delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardSettings {
    /// How long a forward attempt may take to signal readiness, in
    /// milliseconds. Expiry is reported as an error; the entry stays
    /// recorded so a later pod update retries it.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,

    /// Capacity of the aggregated watch event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// First port of the ephemeral window scanned when the preferred local
    /// port is unavailable.
    #[serde(default = "default_scan_start")]
    pub port_scan_start: u16,

    /// Number of candidate ports probed before giving up.
    #[serde(default = "default_scan_span")]
    pub port_scan_span: u16,
}

fn default_forward_timeout_ms() -> u64 {
    5_000
}

fn default_event_buffer() -> usize {
    64
}

fn default_scan_start() -> u16 {
    49_152
}

fn default_scan_span() -> u16 {
    2_048
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self {
            forward_timeout_ms: default_forward_timeout_ms(),
            event_buffer: default_event_buffer(),
            port_scan_start: default_scan_start(),
            port_scan_span: default_scan_span(),
        }
    }
}

impl ForwardSettings {
    /// The forward readiness timeout as a [`Duration`].
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}
