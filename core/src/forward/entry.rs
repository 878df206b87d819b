//! Identity and lifecycle state of one forwardable container port.

use serde::Serialize;

/// Identifies one forwardable container port observed on a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingTarget {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    /// Declared port name; empty when the port is unnamed.
    pub port_name: String,
    pub container_port: u16,
    /// Resource version of the owning pod, compared as an integer.
    pub resource_version: String,
    /// True when the target was discovered from the watch stream rather
    /// than explicitly configured.
    pub automatic: bool,
}

impl ForwardingTarget {
    /// Registry key for this target. Stable across pod updates and pod
    /// recreation as long as the same container/port/name triple recurs.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.container_name, self.namespace, self.port_name, self.container_port
        )
    }

    /// Parses the resource version as an integer staleness token.
    pub fn parsed_resource_version(&self) -> Option<i64> {
        self.resource_version.parse().ok()
    }
}

/// Lifecycle state of a forwarding entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ForwardState {
    /// Created, forward not yet confirmed ready.
    #[default]
    Pending,
    /// The backend session is established.
    Active,
    /// The last forward attempt failed; a newer resource version retries.
    Failed,
}

impl ForwardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

/// Authoritative state for one registry key: the target plus its assigned
/// local port and lifecycle state. At most one entry exists per key; the
/// local port, once chosen, is kept for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingEntry {
    pub target: ForwardingTarget,
    pub local_port: u16,
    pub state: ForwardState,
}

impl ForwardingEntry {
    /// Creates a pending entry for a freshly observed target.
    pub fn new(target: ForwardingTarget, local_port: u16) -> Self {
        Self {
            target,
            local_port,
            state: ForwardState::Pending,
        }
    }

    /// Registry key, delegated to the embedded target.
    pub fn key(&self) -> String {
        self.target.key()
    }
}

impl std::fmt::Display for ForwardingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} port {} -> local {} ({})",
            self.target.namespace,
            self.target.pod_name,
            self.target.container_port,
            self.local_port,
            self.state.as_str()
        )
    }
}
