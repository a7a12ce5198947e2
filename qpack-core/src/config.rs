//! QPACK configuration.
//!
//! Values advertised to the peer in SETTINGS plus the local preference for
//! how much of the peer's table the encoder uses. Loadable from TOML:
//!
//! ```toml
//! max_table_capacity = 4096
//! max_blocked_streams = 100
//! encoder_table_capacity = 2048
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest table capacity accepted in configuration (1 GB).
const MAX_TABLE_CAPACITY_LIMIT: usize = 1 << 30;

/// Largest blocked stream limit accepted in configuration.
const MAX_BLOCKED_STREAMS_LIMIT: usize = 1 << 16;

/// Configuration for one QPACK encoder/decoder pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QpackConfig {
    /// Maximum dynamic table capacity for the decoder (default: 4 KB).
    ///
    /// RFC 9204 Section 3.2.3: Sent in SETTINGS_QPACK_MAX_TABLE_CAPACITY.
    /// Higher values improve compression but use more memory per connection.
    pub max_table_capacity: usize,

    /// Maximum number of blocked streams for the decoder (default: 100).
    ///
    /// RFC 9204 Section 2.1.4: Sent in SETTINGS_QPACK_BLOCKED_STREAMS.
    /// A peer that blocks more streams fails with QPACK_DECOMPRESSION_FAILED.
    pub max_blocked_streams: usize,

    /// Dynamic table capacity the encoder uses (default: the peer's maximum).
    ///
    /// Capped by the peer's SETTINGS_QPACK_MAX_TABLE_CAPACITY.
    pub encoder_table_capacity: Option<usize>,
}

impl Default for QpackConfig {
    fn default() -> Self {
        Self {
            max_table_capacity: 4096,
            max_blocked_streams: 100,
            encoder_table_capacity: None,
        }
    }
}

impl QpackConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config
            .validate()
            .map_err(|errors| Error::InvalidConfig(errors.join("; ")))?;
        Ok(config)
    }

    /// Validate configuration values, returning every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_table_capacity > MAX_TABLE_CAPACITY_LIMIT {
            errors.push(format!(
                "max_table_capacity {} exceeds {}",
                self.max_table_capacity, MAX_TABLE_CAPACITY_LIMIT
            ));
        }

        if self.max_blocked_streams > MAX_BLOCKED_STREAMS_LIMIT {
            errors.push(format!(
                "max_blocked_streams {} exceeds {}",
                self.max_blocked_streams, MAX_BLOCKED_STREAMS_LIMIT
            ));
        }

        if let Some(capacity) = self.encoder_table_capacity {
            if capacity > self.max_table_capacity {
                errors.push(format!(
                    "encoder_table_capacity {} exceeds max_table_capacity {}",
                    capacity, self.max_table_capacity
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QpackConfig::default();
        assert_eq!(config.max_table_capacity, 4096);
        assert_eq!(config.max_blocked_streams, 100);
        assert_eq!(config.encoder_table_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = QpackConfig::from_toml_str("max_blocked_streams = 16\n").unwrap();
        assert_eq!(config.max_table_capacity, 4096);
        assert_eq!(config.max_blocked_streams, 16);
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
            max_table_capacity = 8192
            max_blocked_streams = 0
            encoder_table_capacity = 1024
        "#;
        let config = QpackConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.max_table_capacity, 8192);
        assert_eq!(config.max_blocked_streams, 0);
        assert_eq!(config.encoder_table_capacity, Some(1024));
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = QpackConfig {
            max_table_capacity: 2 << 30,
            max_blocked_streams: 1 << 20,
            encoder_table_capacity: Some(usize::MAX),
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_invalid_toml() {
        let err = QpackConfig::from_toml_str("max_table_capacity = \"big\"").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = QpackConfig::from_toml_str("encoder_table_capacity = 8192").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("encoder_table_capacity")));
    }
}
