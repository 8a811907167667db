//! TOML settings file and platform directory resolution.
//!
//! Settings are read from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\TvRemote\config.toml`
//! - Linux:    `~/.config/tv-remote/config.toml`
//! - macOS:    `~/Library/Application Support/TvRemote/config.toml`
//!
//! ```toml
//! [general]
//! log_level = "info"
//!
//! [tv]
//! ip = "192.168.1.20"
//! mac = "F4:7B:09:AA:BB:CC"
//! port = 8002
//!
//! [discovery]
//! timeout_ms = 250
//! full_window = false
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section or
//! a missing key all fall back to the built-in values.
//!
//! The JSON cache file does not live here but in the platform cache
//! directory; [`cache_file_path`] resolves it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tv_remote_core::domain::config::{DEFAULT_APP_NAME, DEFAULT_PORT};
use tv_remote_core::SessionConfig;

use crate::application::wake::WakeConfig;
use crate::infrastructure::network::discovery::{DiscoveryConfig, DiscoveryPolicy};
use crate::infrastructure::network::wake_on_lan::WakeOnLanConfig;

/// File name of the JSON token / device cache.
pub const CACHE_FILE_NAME: &str = "tv-remote-cache.json";

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The platform config or cache directory could not be determined.
    #[error("could not determine platform directory")]
    NoPlatformDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized to TOML.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Settings schema ───────────────────────────────────────────────────────────

/// Top-level user settings stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub tv: TvSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub wake: WakeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralSettings {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// The TV to talk to when no flag names one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TvSettings {
    /// Fixed address; when absent the target is discovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name shown in the TV's approval prompt.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Connect and handshake timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause after every key.
    #[serde(default = "default_key_delay_ms")]
    pub key_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    #[serde(default = "default_discovery_timeout_ms")]
    pub timeout_ms: u64,
    /// Listen for the whole window instead of stopping at the first TV.
    #[serde(default)]
    pub full_window: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WakeSettings {
    /// Time the TV gets to boot before it is probed again.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Number of magic packets per wake.
    #[serde(default = "default_packets")]
    pub packets: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_key_delay_ms() -> u64 {
    60
}
fn default_discovery_timeout_ms() -> u64 {
    250
}
fn default_grace_period_ms() -> u64 {
    5000
}
fn default_packets() -> u32 {
    30
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for TvSettings {
    fn default() -> Self {
        Self {
            ip: None,
            mac: None,
            port: default_port(),
            app_name: default_app_name(),
            timeout_ms: default_timeout_ms(),
            key_delay_ms: default_key_delay_ms(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_discovery_timeout_ms(),
            full_window: false,
        }
    }
}

impl Default for WakeSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            packets: default_packets(),
        }
    }
}

impl Settings {
    /// Applies the `[tv]` section to a session for `config.ip`.
    pub fn apply_to_session(&self, config: SessionConfig) -> SessionConfig {
        let mut config = config
            .with_port(self.tv.port)
            .with_app_name(self.tv.app_name.clone())
            .with_timeout(Duration::from_millis(self.tv.timeout_ms))
            .with_inter_key_delay(Duration::from_millis(self.tv.key_delay_ms));
        if let Some(mac) = &self.tv.mac {
            if !tv_remote_core::domain::device::is_known_mac(&config.mac) {
                config.mac = mac.clone();
            }
        }
        config
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        let policy = if self.discovery.full_window {
            DiscoveryPolicy::FullWindow
        } else {
            DiscoveryPolicy::FirstHit
        };
        DiscoveryConfig::default()
            .with_timeout(Duration::from_millis(self.discovery.timeout_ms))
            .with_policy(policy)
    }

    pub fn wake_config(&self) -> WakeConfig {
        WakeConfig {
            grace_period: Duration::from_millis(self.wake.grace_period_ms),
        }
    }

    pub fn wake_on_lan_config(&self) -> WakeOnLanConfig {
        WakeOnLanConfig {
            repetitions: self.wake.packets,
            ..WakeOnLanConfig::default()
        }
    }
}

// ── Settings repository ───────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the settings file.
///
/// # Errors
///
/// Returns [`SettingsError::NoPlatformDir`] when the base directory cannot be
/// determined from the environment.
pub fn config_dir() -> Result<PathBuf, SettingsError> {
    platform_config_dir().ok_or(SettingsError::NoPlatformDir)
}

/// Resolves the full path to the settings file.
///
/// # Errors
///
/// Returns [`SettingsError::NoPlatformDir`] if the base directory cannot be
/// determined.
pub fn settings_file_path() -> Result<PathBuf, SettingsError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Resolves the full path to the JSON cache file.
///
/// # Errors
///
/// Returns [`SettingsError::NoPlatformDir`] if the cache directory cannot be
/// determined.
pub fn cache_file_path() -> Result<PathBuf, SettingsError> {
    Ok(platform_cache_dir()
        .ok_or(SettingsError::NoPlatformDir)?
        .join(CACHE_FILE_NAME))
}

/// Loads settings from the platform settings file, returning defaults if the
/// file does not exist yet.
///
/// # Errors
///
/// See [`load_settings_from`].
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(&settings_file_path()?)
}

/// Loads settings from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] for file-system errors other than
/// "not found", and [`SettingsError::Parse`] if the TOML is malformed.
pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(source) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `settings` to the platform settings file.
///
/// # Errors
///
/// See [`save_settings_to`].
pub fn save_settings(settings: &Settings) -> Result<(), SettingsError> {
    save_settings_to(&settings_file_path()?, settings)
}

/// Persists `settings` to `path`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] for file-system failures or
/// [`SettingsError::Serialize`] if serialization fails.
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| SettingsError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the application
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("TvRemote"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".config")))?;
        Some(base.join("tv-remote"))
    }

    #[cfg(target_os = "macos")]
    {
        home_dir().map(|h| h.join("Library").join("Application Support").join("TvRemote"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// Resolves the platform cache directory (no application subdirectory: the
/// cache is a single file).
fn platform_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join("AppData").join("Local")))
    }

    #[cfg(target_os = "macos")]
    {
        home_dir().map(|h| h.join("Library").join("Caches"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        std::env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".cache")))
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";

    std::env::var_os(var)
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tv-remote-test-{}", Uuid::new_v4()))
            .join(name)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        // Arrange / Act
        let settings = Settings::default();

        // Assert
        assert_eq!(settings.general.log_level, "info");
        assert_eq!(settings.tv.port, 8002);
        assert_eq!(settings.tv.app_name, "SamsungTvRemote");
        assert_eq!(settings.tv.timeout_ms, 5000);
        assert_eq!(settings.discovery.timeout_ms, 250);
        assert_eq!(settings.wake.grace_period_ms, 5000);
        assert_eq!(settings.wake.packets, 30);
        assert!(settings.tv.ip.is_none());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        let settings: Settings = toml::from_str("[tv]\nip = \"10.0.0.5\"\nport = 8001\n").unwrap();

        assert_eq!(settings.tv.ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(settings.tv.port, 8001);
        assert_eq!(settings.tv.key_delay_ms, 60);
        assert_eq!(settings.general.log_level, "info");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    // ── Derived configs ───────────────────────────────────────────────────────

    #[test]
    fn test_apply_to_session_copies_tv_section() {
        // Arrange
        let mut settings = Settings::default();
        settings.tv.port = 8001;
        settings.tv.timeout_ms = 1500;
        settings.tv.key_delay_ms = 0;
        settings.tv.mac = Some("AA:BB:CC:DD:EE:FF".to_string());

        // Act
        let cfg = settings.apply_to_session(SessionConfig::new("10.0.0.5"));

        // Assert
        assert_eq!(cfg.port, 8001);
        assert_eq!(cfg.connect_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.handshake_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.inter_key_delay, Duration::ZERO);
        assert_eq!(cfg.mac, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_apply_to_session_keeps_known_mac() {
        let mut settings = Settings::default();
        settings.tv.mac = Some("11:11:11:11:11:11".to_string());

        let cfg = settings
            .apply_to_session(SessionConfig::new("10.0.0.5").with_mac("AA:BB:CC:DD:EE:FF"));

        assert_eq!(cfg.mac, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_discovery_config_follows_full_window_flag() {
        let mut settings = Settings::default();
        settings.discovery.full_window = true;
        settings.discovery.timeout_ms = 1000;

        let cfg = settings.discovery_config();

        assert_eq!(cfg.policy, DiscoveryPolicy::FullWindow);
        assert_eq!(cfg.timeout, Duration::from_millis(1000));
    }

    // ── File round-trip ───────────────────────────────────────────────────────

    #[test]
    fn test_load_settings_from_missing_file_returns_default() {
        let path = temp_path("config.toml");
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load_settings() {
        // Arrange
        let path = temp_path("config.toml");
        let mut settings = Settings::default();
        settings.tv.ip = Some("192.168.1.20".to_string());
        settings.general.log_level = "debug".to_string();

        // Act
        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_settings_from_malformed_file_is_parse_error() {
        let path = temp_path("config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[tv\nport = ").unwrap();

        let result = load_settings_from(&path);

        assert!(matches!(result, Err(SettingsError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_cache_file_path_ends_with_cache_file_name() {
        if let Ok(path) = cache_file_path() {
            assert!(path.ends_with(CACHE_FILE_NAME));
        }
    }
}
