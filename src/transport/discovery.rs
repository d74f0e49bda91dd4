//! Bluetooth device discovery for finding bits

use bit_link_shared::{LinkError, Uuid};
use bluer::{Adapter, AdapterEvent, Device};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Configuration for Bluetooth discovery
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Give up scanning after this long; `None` scans until a bit appears
    pub scan_timeout: Option<Duration>,
    /// Device name prefix to match in addition to the service filter
    pub name_prefix: Option<String>,
}

/// Bluetooth device discovery service
pub struct BitDiscovery {
    config: DiscoveryConfig,
}

impl BitDiscovery {
    /// Create a new discovery service
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Get the default Bluetooth adapter
    pub async fn get_adapter() -> bluer::Result<Adapter> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        Ok(adapter)
    }

    /// Find the first device advertising `service`
    pub async fn find_device(&self, adapter: &Adapter, service: Uuid) -> Result<Device, LinkError> {
        // Devices BlueZ already knows about need no scan
        if let Ok(addresses) = adapter.device_addresses().await {
            for addr in addresses {
                if let Ok(device) = adapter.device(addr) {
                    if self.is_bit_device(&device, service).await {
                        info!("[BT] Using known device {}", addr);
                        return Ok(device);
                    }
                }
            }
        }

        let discover = adapter
            .discover_devices()
            .await
            .map_err(|_| LinkError::CapabilityUnavailable)?;
        tokio::pin!(discover);

        let scan = async {
            while let Some(evt) = discover.next().await {
                if let AdapterEvent::DeviceAdded(addr) = evt {
                    debug!("[BT] Discovered {}", addr);
                    if let Ok(device) = adapter.device(addr) {
                        if self.is_bit_device(&device, service).await {
                            return Some(device);
                        }
                    }
                }
            }
            None
        };

        let found = match self.config.scan_timeout {
            Some(limit) => timeout(limit, scan).await.ok().flatten(),
            None => scan.await,
        };

        found.ok_or(LinkError::DeviceNotFound)
    }

    /// Check if a device advertises the service (and matches the name prefix)
    async fn is_bit_device(&self, device: &Device, service: Uuid) -> bool {
        let advertises = matches!(device.uuids().await, Ok(Some(uuids)) if uuids.contains(&service));
        if !advertises {
            return false;
        }

        match self.config.name_prefix {
            Some(ref prefix) => {
                matches!(device.name().await, Ok(Some(name)) if name.starts_with(prefix))
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert!(config.scan_timeout.is_none());
        assert!(config.name_prefix.is_none());
    }
}
