//! The device descriptor produced by discovery and stored in the cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware address used when a device did not advertise one.
pub const UNKNOWN_MAC: &str = "00:00:00:00:00:00";

/// Label used when no human-readable name is known.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A controllable display found on the network (or remembered from a
/// previous session).
///
/// Devices are immutable once discovered.  Two descriptors refer to the same
/// physical TV when their [`identity_key`](Device::identity_key)s match.
///
/// The serde field names follow the JSON cache document
/// (`friendlyName`, `ip`, `mac`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Human label, e.g. `"[TV] Living Room"`.
    #[serde(default = "default_name")]
    pub friendly_name: String,
    /// Dotted network address.
    pub ip: String,
    /// Hardware address, [`UNKNOWN_MAC`] when not advertised.
    #[serde(default = "default_mac")]
    pub mac: String,
}

fn default_name() -> String {
    UNKNOWN_NAME.to_string()
}

fn default_mac() -> String {
    UNKNOWN_MAC.to_string()
}

impl Device {
    /// Creates a descriptor from its three fields.
    pub fn new(
        friendly_name: impl Into<String>,
        ip: impl Into<String>,
        mac: impl Into<String>,
    ) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            ip: ip.into(),
            mac: mac.into(),
        }
    }

    /// Creates a descriptor for a device seen only by its address: the
    /// friendly name defaults to the address and the MAC is unknown.
    pub fn from_address(ip: impl Into<String>) -> Self {
        let ip = ip.into();
        Self {
            friendly_name: ip.clone(),
            ip,
            mac: UNKNOWN_MAC.to_string(),
        }
    }

    /// Returns `true` when a real hardware address is known.
    pub fn has_known_mac(&self) -> bool {
        is_known_mac(&self.mac)
    }

    /// The key under which this device is deduplicated: the MAC when known,
    /// otherwise the IP address.
    ///
    /// MACs are lower-cased with `:` separators, so `F4-7B-09-…` and
    /// `f4:7b:09:…` name the same TV.
    pub fn identity_key(&self) -> String {
        if self.has_known_mac() {
            self.mac.trim().to_ascii_lowercase().replace('-', ":")
        } else {
            self.ip.clone()
        }
    }
}

/// Returns `true` if `mac` is neither empty nor the [`UNKNOWN_MAC`] placeholder.
pub fn is_known_mac(mac: &str) -> bool {
    let trimmed = mac.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(UNKNOWN_MAC)
}

/// Adds `device` to `devices` unless an entry with the same identity key is
/// already present.  Returns `true` when the device was added.
pub fn insert_unique(devices: &mut Vec<Device>, device: Device) -> bool {
    let key = device.identity_key();
    if devices.iter().any(|d| d.identity_key() == key) {
        return false;
    }
    devices.push(device);
    true
}

/// Adds or replaces `device` by identity key, keeping the original position
/// of a replaced entry.
pub fn upsert(devices: &mut Vec<Device>, device: Device) {
    let key = device.identity_key();
    match devices.iter_mut().find(|d| d.identity_key() == key) {
        Some(existing) => *existing = device,
        None => devices.push(device),
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, ip: {}, mac: {}", self.friendly_name, self.ip, self.mac)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_mac_when_known() {
        // Arrange
        let device = Device::new("TV", "10.0.0.5", "AA:BB:CC:DD:EE:FF");

        // Act / Assert
        assert_eq!(device.identity_key(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_identity_key_falls_back_to_ip_for_unknown_mac() {
        let device = Device::new("TV", "10.0.0.5", UNKNOWN_MAC);
        assert_eq!(device.identity_key(), "10.0.0.5");
    }

    #[test]
    fn test_identity_key_falls_back_to_ip_for_empty_mac() {
        let device = Device::new("TV", "10.0.0.5", "");
        assert_eq!(device.identity_key(), "10.0.0.5");
    }

    #[test]
    fn test_from_address_uses_address_as_name() {
        let device = Device::from_address("192.168.1.20");
        assert_eq!(device.friendly_name, "192.168.1.20");
        assert_eq!(device.mac, UNKNOWN_MAC);
        assert!(!device.has_known_mac());
    }

    #[test]
    fn test_insert_unique_rejects_same_identity_key() {
        // Arrange
        let mut devices = Vec::new();

        // Act
        let first = insert_unique(&mut devices, Device::new("A", "10.0.0.5", "AA:BB:CC:DD:EE:FF"));
        let second = insert_unique(&mut devices, Device::new("B", "10.0.0.6", "AA:BB:CC:DD:EE:FF"));
        let third = insert_unique(&mut devices, Device::from_address("10.0.0.7"));
        let fourth = insert_unique(&mut devices, Device::from_address("10.0.0.7"));

        // Assert
        assert!(first && !second && third && !fourth);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].friendly_name, "A");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut devices = vec![
            Device::new("Old", "10.0.0.5", "AA:BB:CC:DD:EE:FF"),
            Device::from_address("10.0.0.9"),
        ];

        upsert(&mut devices, Device::new("New", "10.0.0.50", "AA:BB:CC:DD:EE:FF"));
        upsert(&mut devices, Device::from_address("10.0.0.10"));

        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].friendly_name, "New");
        assert_eq!(devices[0].ip, "10.0.0.50");
        assert_eq!(devices[2].ip, "10.0.0.10");
    }

    #[test]
    fn test_identity_key_ignores_mac_case_and_separator() {
        let upper = Device::new("TV", "10.0.0.5", "F4-7B-09-AA-BB-CC");
        let lower = Device::new("TV", "10.0.0.5", "f4:7b:09:aa:bb:cc");
        assert_eq!(upper.identity_key(), lower.identity_key());
    }

    #[test]
    fn test_upsert_merges_macs_that_differ_only_in_case() {
        // Arrange: one entry from settings, one from a WAKEUP header.
        let mut devices = vec![Device::new("Configured", "10.0.0.5", "F4:7B:09:AA:BB:CC")];

        // Act
        upsert(&mut devices, Device::new("[TV] Den", "10.0.0.5", "f4:7b:09:aa:bb:cc"));
        let added = insert_unique(&mut devices, Device::new("Dup", "10.0.0.5", "F4:7b:09:Aa:bB:cc"));

        // Assert
        assert!(!added);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].friendly_name, "[TV] Den");
    }

    #[test]
    fn test_display_lists_name_ip_and_mac() {
        let device = Device::new("[TV] Lounge", "10.0.0.5", "AA:BB:CC:DD:EE:FF");
        assert_eq!(
            device.to_string(),
            "[TV] Lounge, ip: 10.0.0.5, mac: AA:BB:CC:DD:EE:FF"
        );
    }

    #[test]
    fn test_serializes_with_camel_case_field_names() {
        let device = Device::new("TV", "10.0.0.5", UNKNOWN_MAC);

        let json = serde_json::to_string(&device).unwrap();

        assert!(json.contains("\"friendlyName\":\"TV\""), "got {json}");
        assert!(json.contains("\"ip\":\"10.0.0.5\""));
    }

    #[test]
    fn test_deserialize_missing_optional_fields_uses_defaults() {
        let device: Device = serde_json::from_str(r#"{"ip":"10.0.0.9"}"#).unwrap();
        assert_eq!(device.friendly_name, UNKNOWN_NAME);
        assert_eq!(device.mac, UNKNOWN_MAC);
    }
}
