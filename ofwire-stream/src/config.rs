//! Stream configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via OFWIRE_CONFIG)
//! 3. Environment variables

use crate::error::ConfigError;
use ofwire_protocol::IPV6_HEADER_LEN;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default capacity of the inbound message channel.
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

/// Default capacity of the outbound write queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Largest IPv6 packet without jumbograms.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = IPV6_HEADER_LEN + u16::MAX as usize;

/// Message stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Decoded messages buffered before the reader waits for the consumer.
    pub inbound_capacity: usize,
    /// Queued outbound writes before senders wait.
    pub outbound_capacity: usize,
    /// Frames longer than this end the stream.
    pub max_message_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("OFWIRE_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: StreamConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config.normalized())
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    /// Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(size) = read("OFWIRE_READ_BUFFER_SIZE") {
            self.read_buffer_size = size;
        }
        if let Some(n) = read("OFWIRE_INBOUND_CAPACITY") {
            self.inbound_capacity = n;
        }
        if let Some(n) = read("OFWIRE_OUTBOUND_CAPACITY") {
            self.outbound_capacity = n;
        }
        if let Some(max) = read("OFWIRE_MAX_MESSAGE_SIZE") {
            self.max_message_size = max;
        }

        *self = self.clone().normalized();
    }

    /// Brings every field into its allowed range.
    fn normalized(self) -> Self {
        let (read, inbound, outbound) = (
            self.read_buffer_size,
            self.inbound_capacity,
            self.outbound_capacity,
        );
        self.with_read_buffer_size(read)
            .with_inbound_capacity(inbound)
            .with_outbound_capacity(outbound)
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.inbound_capacity, 256);
        assert_eq!(config.outbound_capacity, 64);
        assert_eq!(config.max_message_size, 65575);
    }

    #[test]
    fn test_config_buffer_clamping() {
        let config = StreamConfig::new().with_read_buffer_size(100); // Below minimum
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);

        let config = StreamConfig::new().with_read_buffer_size(10 * 1024 * 1024); // Above maximum
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);

        let config = StreamConfig::new()
            .with_inbound_capacity(0)
            .with_outbound_capacity(0);
        assert_eq!(config.inbound_capacity, 1);
        assert_eq!(config.outbound_capacity, 1);
    }

    #[test]
    fn test_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ofwire.yaml");
        std::fs::write(&path, "read_buffer_size: 16\ninbound_capacity: 4\n").unwrap();

        let config = StreamConfig::from_file(&path).unwrap();
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);
        assert_eq!(config.inbound_capacity, 4);
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
    }

    #[test]
    fn test_yaml_file_is_normalized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ofwire.yaml");
        std::fs::write(
            &path,
            "read_buffer_size: 4194304\ninbound_capacity: 0\noutbound_capacity: 0\n",
        )
        .unwrap();

        let config = StreamConfig::from_file(&path).unwrap();
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
        assert_eq!(config.inbound_capacity, 1);
        assert_eq!(config.outbound_capacity, 1);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ofwire.yaml");
        let config = StreamConfig::new()
            .with_inbound_capacity(8)
            .with_max_message_size(1500);
        config.save(&path).unwrap();
        assert_eq!(StreamConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            StreamConfig::from_file(&missing),
            Err(ConfigError::Io(path, _)) if path == missing
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "inbound_capacity: [1, 2]\n").unwrap();
        assert!(matches!(
            StreamConfig::from_file(&bad),
            Err(ConfigError::Parse(..))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OFWIRE_READ_BUFFER_SIZE", "65536"),
            ("OFWIRE_INBOUND_CAPACITY", "0"),
            ("OFWIRE_OUTBOUND_CAPACITY", "not a number"),
            ("OFWIRE_MAX_MESSAGE_SIZE", " 9000 "),
        ]
        .into_iter()
        .collect();

        let mut config = StreamConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.read_buffer_size, 65536);
        assert_eq!(config.inbound_capacity, 1);
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
        assert_eq!(config.max_message_size, 9000);
    }
}
