//! File-backed token and device cache.
//!
//! The whole cache is one JSON document:
//!
//! ```json
//! {
//!   "lastConnectedDevice": { "friendlyName": "[TV] Lounge", "ip": "192.168.1.20", "mac": "F4:7B:09:AA:BB:CC" },
//!   "appTokens": { "SamsungTvRemote": { "192.168.1.20:8002": "12345678" } },
//!   "knownDevices": { "F4:7B:09:AA:BB:CC": { "friendlyName": "[TV] Lounge", "ip": "192.168.1.20", "mac": "F4:7B:09:AA:BB:CC" } }
//! }
//! ```
//!
//! Reads never fail: a missing or malformed file is an empty cache.  Writes
//! re-read the document, change one entry and rewrite the whole file.  There
//! is no cross-process locking; two processes writing at once may lose one of
//! the writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;
use tv_remote_core::Device;

pub use crate::application::store::CacheError;
use crate::application::store::TokenStore;
use crate::infrastructure::storage::config::{cache_file_path, SettingsError};

/// On-disk shape of the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_connected_device: Option<Device>,
    /// Application name → `ip:port` → token.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    app_tokens: BTreeMap<String, BTreeMap<String, String>>,
    /// Identity key → device.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    known_devices: BTreeMap<String, Device>,
}

/// [`TokenStore`] persisted as a JSON file.
#[derive(Debug)]
pub struct JsonCache {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the cache at the platform cache location.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NoPlatformDir`] if no cache directory can be
    /// determined.
    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::new(cache_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> CacheDocument {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("cannot read cache {}: {e}", self.path.display());
                }
                return CacheDocument::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            debug!("ignoring malformed cache {}: {e}", self.path.display());
            CacheDocument::default()
        })
    }

    fn update(&self, change: impl FnOnce(&mut CacheDocument)) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.read();
        change(&mut document);
        self.write(&document)
    }

    fn write(&self, document: &CacheDocument) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CacheError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string(document)?;
        std::fs::write(&self.path, content).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn endpoint_key(ip: &str, port: u16) -> String {
    format!("{ip}:{port}")
}

impl TokenStore for JsonCache {
    fn token(&self, app_name: &str, ip: &str, port: u16) -> Option<String> {
        self.read()
            .app_tokens
            .get(app_name)?
            .get(&endpoint_key(ip, port))
            .cloned()
    }

    fn save_token(
        &self,
        app_name: &str,
        ip: &str,
        port: u16,
        token: &str,
    ) -> Result<(), CacheError> {
        self.update(|doc| {
            doc.app_tokens
                .entry(app_name.to_string())
                .or_default()
                .insert(endpoint_key(ip, port), token.to_string());
        })
    }

    fn last_device(&self) -> Option<Device> {
        self.read().last_connected_device
    }

    fn save_device(&self, device: &Device) -> Result<(), CacheError> {
        self.update(|doc| doc.last_connected_device = Some(device.clone()))
    }

    fn known_devices(&self) -> Vec<Device> {
        self.read().known_devices.into_values().collect()
    }

    fn remember_devices(&self, devices: &[Device]) -> Result<(), CacheError> {
        self.update(|doc| {
            for device in devices {
                let key = device.identity_key();
                // Entries written under a differently cased key name the same TV.
                doc.known_devices.retain(|_, d| d.identity_key() != key);
                doc.known_devices.insert(key, device.clone());
            }
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// A cache in a fresh temporary directory; removed on drop.
    struct TempCache {
        cache: JsonCache,
        dir: PathBuf,
    }

    impl TempCache {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("tv-remote-cache-{}", Uuid::new_v4()));
            Self {
                cache: JsonCache::new(dir.join("cache.json")),
                dir,
            }
        }
    }

    impl Drop for TempCache {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn test_missing_file_reads_as_empty_cache() {
        // Arrange
        let temp = TempCache::new();

        // Act / Assert
        assert!(temp.cache.token("App", "10.0.0.5", 8002).is_none());
        assert!(temp.cache.last_device().is_none());
        assert!(temp.cache.known_devices().is_empty());
    }

    #[test]
    fn test_token_round_trip_and_unrelated_key_is_absent() {
        // Arrange
        let temp = TempCache::new();

        // Act
        temp.cache.save_token("App", "10.0.0.5", 8002, "tok").unwrap();

        // Assert
        assert_eq!(temp.cache.token("App", "10.0.0.5", 8002).as_deref(), Some("tok"));
        assert!(temp.cache.token("App", "10.0.0.5", 8001).is_none());
        assert!(temp.cache.token("Other", "10.0.0.5", 8002).is_none());
    }

    #[test]
    fn test_malformed_file_reads_as_empty_and_is_replaced_on_write() {
        let temp = TempCache::new();
        std::fs::create_dir_all(&temp.dir).unwrap();
        std::fs::write(temp.cache.path(), "{ not json").unwrap();

        assert!(temp.cache.last_device().is_none());

        temp.cache
            .save_device(&Device::from_address("10.0.0.5"))
            .unwrap();
        assert_eq!(temp.cache.last_device().unwrap().ip, "10.0.0.5");
    }

    #[test]
    fn test_writes_preserve_other_sections() {
        // Arrange
        let temp = TempCache::new();
        let tv = Device::new("[TV] Lounge", "10.0.0.5", "AA:BB:CC:DD:EE:FF");

        // Act
        temp.cache.save_token("App", "10.0.0.5", 8002, "tok").unwrap();
        temp.cache.save_device(&tv).unwrap();
        temp.cache.remember_devices(&[tv.clone()]).unwrap();

        // Assert
        assert_eq!(temp.cache.token("App", "10.0.0.5", 8002).as_deref(), Some("tok"));
        assert_eq!(temp.cache.last_device(), Some(tv.clone()));
        assert_eq!(temp.cache.known_devices(), vec![tv]);
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let temp = TempCache::new();
        temp.cache.save_token("App", "10.0.0.5", 8002, "tok").unwrap();
        temp.cache
            .save_device(&Device::new("TV", "10.0.0.5", "AA:BB:CC:DD:EE:FF"))
            .unwrap();

        let raw = std::fs::read_to_string(temp.cache.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["appTokens"]["App"]["10.0.0.5:8002"], "tok");
        assert_eq!(value["lastConnectedDevice"]["friendlyName"], "TV");
        assert!(value.get("knownDevices").is_none());
    }

    #[test]
    fn test_remember_devices_keys_by_identity() {
        let temp = TempCache::new();

        temp.cache
            .remember_devices(&[
                Device::new("Old", "10.0.0.5", "AA:BB:CC:DD:EE:FF"),
                Device::from_address("10.0.0.9"),
            ])
            .unwrap();
        temp.cache
            .remember_devices(&[Device::new("New", "10.0.0.6", "AA:BB:CC:DD:EE:FF")])
            .unwrap();

        let known = temp.cache.known_devices();
        assert_eq!(known.len(), 2);
        assert!(known.iter().any(|d| d.friendly_name == "New"));
        assert!(!known.iter().any(|d| d.friendly_name == "Old"));
    }

    #[test]
    fn test_remember_devices_replaces_entry_stored_under_other_mac_case() {
        // Arrange: an older file keyed by the upper-case MAC.
        let temp = TempCache::new();
        std::fs::create_dir_all(&temp.dir).unwrap();
        std::fs::write(
            temp.cache.path(),
            r#"{"knownDevices":{"F4:7B:09:AA:BB:CC":{"friendlyName":"Old","ip":"10.0.0.5","mac":"F4:7B:09:AA:BB:CC"}}}"#,
        )
        .unwrap();

        // Act
        temp.cache
            .remember_devices(&[Device::new("[TV] Den", "10.0.0.5", "f4:7b:09:aa:bb:cc")])
            .unwrap();

        // Assert
        let known = temp.cache.known_devices();
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].friendly_name, "[TV] Den");
    }
}
