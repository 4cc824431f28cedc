//! Configuration types for the JSON-RPC engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default window a call waits for its response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to every outbound call unless overridden per call
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Largest inbound batch accepted; larger batches get a single
    /// Invalid Request reply
    pub max_batch_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_batch_size: None,
        }
    }
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_timeout() {
        assert_eq!(EngineConfig::default().request_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig {
            request_timeout: Duration::from_millis(250),
            max_batch_size: Some(10),
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({"request_timeout": 250, "max_batch_size": 10}));
        let parsed: EngineConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: EngineConfig = serde_json::from_value(json!({"max_batch_size": 3})).unwrap();
        assert_eq!(parsed.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(parsed.max_batch_size, Some(3));
    }
}
