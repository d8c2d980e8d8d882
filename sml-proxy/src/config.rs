//! YAML configuration model

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    #[serde(default)]
    pub meters: Vec<MeterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Listen address of the HTTP exporter, e.g. `127.0.0.1:8080`.
    pub address: String,
    #[serde(default)]
    pub disable_request_log: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterConfig {
    /// Key of this meter in the process image.
    pub id: String,
    /// `host:port` of the meter's TCP telegram output.
    pub address: String,
    /// Seconds to wait before reconnecting after a connection drops.
    #[serde(default)]
    pub reconnect_delay: u64,
    /// Per-read timeout in seconds; 0 waits indefinitely.
    #[serde(default)]
    pub read_timeout: u64,
    /// Connect timeout in seconds; 0 waits indefinitely.
    #[serde(default)]
    pub connect_timeout: u64,
    #[serde(default)]
    pub disable_reception_log: bool,
    /// Dump every received file to the log as JSON.
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = serde_yaml::from_str(
            r#"
web:
  address: "127.0.0.1:8080"
  disable_request_log: true
meters:
  - id: "house"
    address: "192.168.1.10:2000"
    reconnect_delay: 10
    read_timeout: 30
    connect_timeout: 5
    disable_reception_log: true
    debug: true
"#,
        )
        .unwrap();

        assert_eq!(config.web.address, "127.0.0.1:8080");
        assert!(config.web.disable_request_log);
        assert_eq!(config.meters.len(), 1);

        let meter = &config.meters[0];
        assert_eq!(meter.id, "house");
        assert_eq!(meter.address, "192.168.1.10:2000");
        assert_eq!(meter.reconnect_delay, 10);
        assert_eq!(meter.read_timeout, 30);
        assert_eq!(meter.connect_timeout, 5);
        assert!(meter.debug);
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
web:
  address: ":8080"
meters:
  - id: "m1"
    address: "10.0.0.1:2000"
"#,
        )
        .unwrap();

        assert!(!config.web.disable_request_log);
        let meter = &config.meters[0];
        assert_eq!(meter.reconnect_delay, 0);
        assert_eq!(meter.read_timeout, 0);
        assert_eq!(meter.connect_timeout, 0);
        assert!(!meter.disable_reception_log);
        assert!(!meter.debug);
    }

    #[test]
    fn test_meters_may_be_absent() {
        let config: Config = serde_yaml::from_str("web:\n  address: \":8080\"\n").unwrap();
        assert!(config.meters.is_empty());
    }
}
