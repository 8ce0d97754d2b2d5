use crate::transport::TransportConfig;
use serde::Deserialize;

/// Per-session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    /// Capacity of the broadcast channel carrying [`crate::SessionEvent`]s.
    pub event_capacity: usize,
    /// Seed the message log from the persistence collaborator on open.
    pub load_history: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            event_capacity: 256,
            load_history: true,
        }
    }
}
