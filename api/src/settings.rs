use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a [`crate::YoctoApi`] context. Every field has a default, so a partial (or
/// empty) settings file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Hubs registered at start-up by front-ends, e.g. "127.0.0.1" or "http://yoctohub:4444".
    pub hubs: Vec<String>,

    /// How long a function's attribute snapshot is trusted before reloading it.
    pub cache_validity_ms: u64,

    /// How long the module/function inventory is trusted before asking the hubs again.
    pub device_list_validity_ms: u64,

    pub network_timeout_ms: u64,

    /// Pause between two event polls while sleeping.
    pub poll_interval_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            hubs: vec![String::from("127.0.0.1")],
            cache_validity_ms: 5,
            device_list_validity_ms: 10_000,
            network_timeout_ms: 20_000,
            poll_interval_ms: 250,
        }
    }
}

impl ApiSettings {
    pub fn cache_validity(&self) -> Duration {
        Duration::from_millis(self.cache_validity_ms)
    }

    pub fn device_list_validity(&self) -> Duration {
        Duration::from_millis(self.device_list_validity_ms)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: ApiSettings = serde_json::from_str(r#"{"cache_validity_ms": 50}"#).unwrap();
        assert_eq!(settings.cache_validity(), Duration::from_millis(50));
        assert_eq!(settings.device_list_validity_ms, 10_000);
        assert_eq!(settings.hubs, vec![String::from("127.0.0.1")]);
    }
}
