//! Inventory entries and their resolution into runnable devices.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::PlatformError;
use crate::platform::{PlatformDefinition, PlatformRegistry, platform_key};
use crate::transport::{ConnectionOverrides, ConnectionParams, Credentials, Protocol};

/// One device as described by the inventory.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    /// Identifier used in results.
    pub name: String,

    /// Hostname or IP address.
    #[serde(alias = "ip")]
    pub address: String,

    /// Vendor, e.g. "cisco".
    pub vendor: String,

    /// Platform, e.g. "ios".
    pub platform: String,

    /// Wire protocol.
    #[serde(default, alias = "connector")]
    pub protocol: Protocol,

    /// Overrides for the driver's connection defaults.
    #[serde(default)]
    pub connection: ConnectionOverrides,
}

impl DeviceEntry {
    /// Create an SSH entry with driver defaults.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        vendor: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            vendor: vendor.into(),
            platform: platform.into(),
            protocol: Protocol::Ssh,
            connection: ConnectionOverrides::default(),
        }
    }

    /// Use `protocol` instead of SSH.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Replace the connection overrides.
    pub fn with_connection(mut self, connection: ConnectionOverrides) -> Self {
        self.connection = connection;
        self
    }

    /// Driver table key for this entry.
    pub fn key(&self) -> String {
        platform_key(&self.vendor, &self.platform)
    }
}

/// A device with its driver and connection parameters resolved. Read-only
/// for the duration of a run.
#[derive(Debug, Clone)]
pub struct Device {
    /// Identifier used in results.
    pub name: String,

    /// Hostname or IP address.
    pub address: String,

    /// Driver for the device's vendor/platform.
    pub platform: Arc<PlatformDefinition>,

    /// Login credentials, shared by every device in the run.
    pub credentials: Arc<Credentials>,

    /// Resolved connection parameters.
    pub params: ConnectionParams,

    /// Per-command response timeout.
    pub timeout: Duration,
}

impl Device {
    /// Resolve `entry` against `platform`, merging the driver's connection
    /// defaults with the entry's overrides.
    pub fn resolve(
        entry: DeviceEntry,
        platform: Arc<PlatformDefinition>,
        credentials: Arc<Credentials>,
        connect_timeout: Duration,
    ) -> Self {
        let params = ConnectionParams::resolve(
            entry.protocol,
            &platform.connection,
            &entry.connection,
            connect_timeout,
        );
        let timeout = entry
            .connection
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(platform.timeout);

        Self {
            name: entry.name,
            address: entry.address,
            platform,
            credentials,
            params,
            timeout,
        }
    }
}

/// Outcome of resolving an inventory.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Devices ready to schedule, in inventory order.
    pub devices: Vec<Device>,

    /// Entries with no driver; excluded from the run.
    pub unsupported: Vec<PlatformError>,
}

/// Resolve every inventory entry in one pass.
///
/// Entries whose vendor/platform has no driver are reported with a warning
/// and left out; they never reach the scheduler.
pub fn resolve_inventory(
    entries: impl IntoIterator<Item = DeviceEntry>,
    credentials: &Arc<Credentials>,
    registry: &PlatformRegistry,
    connect_timeout: Duration,
) -> Resolution {
    let mut resolution = Resolution::default();

    for entry in entries {
        let key = entry.key();
        match registry.get(&key) {
            Some(platform) => {
                debug!("{}: resolved driver {}", entry.name, key);
                resolution.devices.push(Device::resolve(
                    entry,
                    Arc::clone(platform),
                    Arc::clone(credentials),
                    connect_timeout,
                ));
            }
            None => {
                let err = PlatformError::UnsupportedPlatform {
                    device: entry.name,
                    key,
                };
                warn!("{}", err);
                resolution.unsupported.push(err);
            }
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HostKeyVerification;

    fn credentials() -> Arc<Credentials> {
        Arc::new(Credentials::new("admin").with_password("secret"))
    }

    #[test]
    fn test_unsupported_device_is_excluded() {
        let registry = PlatformRegistry::builtin().unwrap();
        let entries = vec![
            DeviceEntry::new("r1", "192.0.2.1", "cisco", "ios"),
            DeviceEntry::new("x1", "192.0.2.9", "foo", "bar"),
            DeviceEntry::new("sw1", "192.0.2.2", "arista", "eos"),
        ];

        let resolution =
            resolve_inventory(entries, &credentials(), &registry, Duration::from_secs(10));

        let names: Vec<&str> = resolution.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["r1", "sw1"]);
        assert_eq!(resolution.unsupported.len(), 1);
        assert!(matches!(
            &resolution.unsupported[0],
            PlatformError::UnsupportedPlatform { device, key } if device == "x1" && key == "foo_bar"
        ));
    }

    #[test]
    fn test_driver_defaults_and_overrides() {
        let registry = PlatformRegistry::builtin().unwrap();
        let entries = vec![
            DeviceEntry::new("r1", "192.0.2.1", "cisco", "ios"),
            DeviceEntry::new("r2", "192.0.2.2", "cisco", "ios")
                .with_protocol(Protocol::Telnet)
                .with_connection(ConnectionOverrides {
                    legacy_ciphers: Some(false),
                    insecure_host_key: Some(false),
                    timeout_secs: Some(30),
                    ..Default::default()
                }),
        ];

        let resolution =
            resolve_inventory(entries, &credentials(), &registry, Duration::from_secs(10));
        let [r1, r2] = resolution.devices.as_slice() else {
            panic!("expected two devices");
        };

        assert_eq!(r1.params.port, 22);
        assert!(r1.params.legacy_ciphers);
        assert_eq!(r1.params.host_key_verification, HostKeyVerification::Disabled);
        assert_eq!(r1.timeout, Duration::from_secs(2));

        assert_eq!(r2.params.port, 23);
        assert!(!r2.params.legacy_ciphers);
        assert_eq!(r2.params.host_key_verification, HostKeyVerification::Strict);
        assert_eq!(r2.timeout, Duration::from_secs(30));
        assert!(Arc::ptr_eq(&r1.credentials, &r2.credentials));
    }

    #[test]
    fn test_entry_deserialize() {
        let entry: DeviceEntry = serde_json::from_str(
            r#"{"name": "r1", "ip": "192.0.2.1", "vendor": "cisco", "platform": "ios",
                "connector": "telnet", "connection": {"port": 2323}}"#,
        )
        .unwrap();
        assert_eq!(entry.address, "192.0.2.1");
        assert_eq!(entry.protocol, Protocol::Telnet);
        assert_eq!(entry.connection.port, Some(2323));
        assert_eq!(entry.key(), "cisco_ios");
    }
}
