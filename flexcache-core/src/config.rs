use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_MAX_DEPTH;

/// Tunables for a [`FlexibleCodec`](crate::FlexibleCodec).
///
/// Missing fields take their defaults, so the config can be embedded in an
/// application's own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// How deeply dynamic members may nest below the root.
    pub max_depth: usize,
    /// Upper bound on payload size, checked on both encode and decode.
    pub max_payload_bytes: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            max_payload_bytes: None,
        }
    }
}

impl CodecConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::Value;

    #[test]
    fn empty_config_uses_defaults() {
        let config: CodecConfig = Value::Map(vec![]).deserialized().unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.max_payload_bytes, None);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let value = Value::Map(vec![(
            Value::Text("max_payload_bytes".into()),
            Value::Integer(1024u32.into()),
        )]);
        let config: CodecConfig = value.deserialized().unwrap();
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.max_payload_bytes, Some(1024));
    }

    #[test]
    fn builders() {
        let config = CodecConfig::default().with_max_depth(3).with_max_payload_bytes(10);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_payload_bytes, Some(10));
    }
}
