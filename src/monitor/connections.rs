//! Cache of the provider's open cluster connections

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::observability::{log_event_with_fields, Event};

/// Connection state change reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Connected => write!(f, "connected"),
            ConnectionEvent::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// One open connection. The address is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    /// Peer node identity, once known
    pub node_id: Option<String>,
    /// Transport scheme, e.g. `tcp` or `ssl`
    pub scheme: String,
    pub address: String,
}

/// Connection list in connect order.
///
/// Connecting an address already present and disconnecting an unknown
/// address are both ignored.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    connections: Mutex<Vec<Connection>>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one provider callback. Returns whether the cache changed.
    pub fn update(&self, event: ConnectionEvent, scheme: &str, address: &str) -> bool {
        let changed = {
            let mut connections = self.lock();
            match event {
                ConnectionEvent::Connected => {
                    if connections.iter().any(|c| c.address == address) {
                        false
                    } else {
                        connections.push(Connection {
                            node_id: None,
                            scheme: scheme.to_string(),
                            address: address.to_string(),
                        });
                        true
                    }
                }
                ConnectionEvent::Disconnected => {
                    match connections.iter().position(|c| c.address == address) {
                        Some(index) => {
                            connections.remove(index);
                            true
                        }
                        None => false,
                    }
                }
            }
        };

        if changed {
            let event = match event {
                ConnectionEvent::Connected => Event::ConnectionAdded,
                ConnectionEvent::Disconnected => Event::ConnectionRemoved,
            };
            log_event_with_fields(event, &[("address", address), ("scheme", scheme)]);
        }
        changed
    }

    /// Attach the peer's node identity to the connection at `address`.
    pub fn identify(&self, address: &str, node_id: &str) -> bool {
        match self.lock().iter_mut().find(|c| c.address == address) {
            Some(conn) => {
                conn.node_id = Some(node_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }
}
