use serde::Deserialize;

/// Settings for the direct peer connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
    pub data_channel_label: String,
    /// Gather candidates on loopback interfaces too (single-host setups).
    pub include_loopback_candidates: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_owned()],
            data_channel_label: "chat".to_owned(),
            include_loopback_candidates: false,
        }
    }
}
