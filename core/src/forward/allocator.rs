//! Local port allocation.
//!
//! Stateless: the allocator never records what it hands out. The entry
//! manager owns the taken-port registry and passes it in on every call.

use std::collections::HashSet;
use std::net::TcpListener;

use crate::config::ForwardSettings;
use crate::error::{Error, Result};

/// Candidate ports considered when the preferred port is unavailable.
#[derive(Debug, Clone)]
pub enum PortPool {
    /// Probe a fixed window of the ephemeral range for bindability.
    Ephemeral { start: u16, span: u16 },
    /// Only the listed ports are usable; no bind probing. Used by tests and
    /// by callers that manage availability themselves.
    Provided(Vec<u16>),
}

/// Picks free local ports for forwarding entries.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    pool: PortPool,
}

impl PortAllocator {
    pub fn new(pool: PortPool) -> Self {
        Self { pool }
    }

    /// Allocator over an explicit candidate list.
    pub fn with_pool(ports: Vec<u16>) -> Self {
        Self::new(PortPool::Provided(ports))
    }

    /// Allocator probing the ephemeral window configured in the settings.
    pub fn from_settings(settings: &ForwardSettings) -> Self {
        Self::new(PortPool::Ephemeral {
            start: settings.port_scan_start,
            span: settings.port_scan_span,
        })
    }

    /// Returns `preferred` when it is not taken and usable, otherwise the
    /// first usable candidate from the pool. The caller is responsible for
    /// recording the returned port as taken.
    pub fn allocate(&self, preferred: u16, taken: &HashSet<u16>) -> Result<u16> {
        if !taken.contains(&preferred) && self.usable(preferred) {
            return Ok(preferred);
        }

        match &self.pool {
            PortPool::Ephemeral { start, span } => {
                let end = start.saturating_add(*span);
                for port in *start..end {
                    if !taken.contains(&port) && Self::can_bind(port) {
                        return Ok(port);
                    }
                }
            }
            PortPool::Provided(ports) => {
                for &port in ports {
                    if !taken.contains(&port) {
                        return Ok(port);
                    }
                }
            }
        }

        Err(Error::PortExhausted { preferred })
    }

    fn usable(&self, port: u16) -> bool {
        match &self.pool {
            PortPool::Ephemeral { .. } => Self::can_bind(port),
            PortPool::Provided(ports) => ports.contains(&port),
        }
    }

    /// A port is usable when a loopback listener can claim it right now.
    fn can_bind(port: u16) -> bool {
        TcpListener::bind(("127.0.0.1", port)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_port_returned_when_free() {
        let allocator = PortAllocator::with_pool(vec![8080]);
        let taken = HashSet::new();
        assert_eq!(allocator.allocate(8080, &taken).unwrap(), 8080);
    }

    #[test]
    fn test_falls_back_to_pool_when_preferred_unusable() {
        // 8080 is not in the pool, so it is not considered usable.
        let allocator = PortAllocator::with_pool(vec![9000]);
        let taken = HashSet::new();
        assert_eq!(allocator.allocate(8080, &taken).unwrap(), 9000);
    }

    #[test]
    fn test_skips_taken_ports() {
        let allocator = PortAllocator::with_pool(vec![8080, 9000]);
        let taken: HashSet<u16> = [8080].into_iter().collect();
        assert_eq!(allocator.allocate(8080, &taken).unwrap(), 9000);
    }

    #[test]
    fn test_exhausted_pool_errors() {
        let allocator = PortAllocator::with_pool(vec![8080]);
        let taken: HashSet<u16> = [8080].into_iter().collect();
        assert!(matches!(
            allocator.allocate(8080, &taken),
            Err(Error::PortExhausted { preferred: 8080 })
        ));
    }

    #[test]
    fn test_from_settings_scans_the_configured_window() {
        let allocator = PortAllocator::from_settings(&ForwardSettings {
            port_scan_start: 50_000,
            port_scan_span: 64,
            ..ForwardSettings::default()
        });
        // Hold the preferred port so the scan must kick in.
        let held = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let preferred = held.local_addr().unwrap().port();
        let taken = HashSet::new();
        let port = allocator.allocate(preferred, &taken).unwrap();
        assert_ne!(port, preferred);
        assert!((50_000..50_064).contains(&port));
    }

    #[test]
    fn test_ephemeral_scan_finds_a_bindable_port() {
        let allocator = PortAllocator::new(PortPool::Ephemeral {
            start: 49_152,
            span: 2_048,
        });
        // Hold the preferred port so the scan must kick in.
        let held = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let preferred = held.local_addr().unwrap().port();
        let taken = HashSet::new();
        let port = allocator.allocate(preferred, &taken).unwrap();
        assert_ne!(port, preferred);
        assert!((49_152..51_200).contains(&port));
    }
}
