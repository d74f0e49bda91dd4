//! Application configuration
//!
//! Every field has a default; `BIT_LINK_*` environment variables override
//! them.

use crate::transport::DiscoveryConfig;
use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Which transport the manager drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Real BLE via BlueZ
    #[default]
    Bluetooth,
    /// Fabricated device, no hardware needed
    Simulated,
}

impl std::str::FromStr for TransportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bluetooth" | "ble" => Ok(TransportMode::Bluetooth),
            "simulated" | "dummy" => Ok(TransportMode::Simulated),
            other => bail!("unknown transport '{}' (expected bluetooth or simulated)", other),
        }
    }
}

/// Configuration for the bit-link binary
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Label of the connection slot to drive
    pub label: String,
    /// Value written as soon as the link is up
    pub initial_value: u8,
    pub transport: TransportMode,
    /// Selection delay of the simulated transport
    pub simulated_delay: Duration,
    /// BlueZ discovery settings
    pub discovery: DiscoveryConfig,
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label: "bit".into(),
            initial_value: 0,
            transport: TransportMode::Bluetooth,
            simulated_delay: Duration::from_secs(1),
            discovery: DiscoveryConfig::default(),
            log_filter: "info".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(label) = lookup("BIT_LINK_LABEL") {
            config.label = label;
        }
        if let Some(value) = lookup("BIT_LINK_VALUE") {
            config.initial_value = value
                .parse()
                .with_context(|| format!("BIT_LINK_VALUE must be 0-255, got '{}'", value))?;
        }
        if let Some(mode) = lookup("BIT_LINK_TRANSPORT") {
            config.transport = mode.parse()?;
        }
        if let Some(ms) = lookup("BIT_LINK_SIM_DELAY_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("BIT_LINK_SIM_DELAY_MS is not a number: '{}'", ms))?;
            config.simulated_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup("BIT_LINK_SCAN_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().with_context(|| {
                format!("BIT_LINK_SCAN_TIMEOUT_SECS is not a number: '{}'", secs)
            })?;
            config.discovery.scan_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(prefix) = lookup("BIT_LINK_NAME_PREFIX") {
            config.discovery.name_prefix = Some(prefix);
        }
        if let Some(filter) = lookup("BIT_LINK_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.label, "bit");
        assert_eq!(config.initial_value, 0);
        assert_eq!(config.transport, TransportMode::Bluetooth);
        assert_eq!(config.simulated_delay, Duration::from_secs(1));
        assert!(config.discovery.scan_timeout.is_none());
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BIT_LINK_LABEL", "led"),
            ("BIT_LINK_VALUE", "128"),
            ("BIT_LINK_TRANSPORT", "Simulated"),
            ("BIT_LINK_SIM_DELAY_MS", "250"),
            ("BIT_LINK_SCAN_TIMEOUT_SECS", "15"),
            ("BIT_LINK_NAME_PREFIX", "w30"),
        ]))
        .unwrap();

        assert_eq!(config.label, "led");
        assert_eq!(config.initial_value, 128);
        assert_eq!(config.transport, TransportMode::Simulated);
        assert_eq!(config.simulated_delay, Duration::from_millis(250));
        assert_eq!(config.discovery.scan_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.discovery.name_prefix.as_deref(), Some("w30"));
    }

    #[test]
    fn test_value_out_of_range() {
        let err = AppConfig::from_lookup(lookup(&[("BIT_LINK_VALUE", "300")])).unwrap_err();
        assert!(err.to_string().contains("BIT_LINK_VALUE"));
    }

    #[test]
    fn test_unknown_transport() {
        assert!(AppConfig::from_lookup(lookup(&[("BIT_LINK_TRANSPORT", "usb")])).is_err());
        assert_eq!(
            "dummy".parse::<TransportMode>().unwrap(),
            TransportMode::Simulated
        );
    }
}
