//! Session configuration types.
//!
//! [`SessionConfig`] is the single source of truth for how a control session
//! reaches its TV.  It is a plain struct with no environment reads; the
//! binary populates it from CLI flags and the settings file, tests build it
//! directly.

use std::time::Duration;

use thiserror::Error;

use crate::domain::device::{Device, UNKNOWN_MAC, UNKNOWN_NAME};

/// Application name the TV shows in its "allow this device?" prompt.
pub const DEFAULT_APP_NAME: &str = "SamsungTvRemote";

/// Control-channel port on 2018+ models (TLS).
pub const DEFAULT_PORT: u16 = 8002;

/// Control-channel port on 2016/2017 models (plain WebSocket).
pub const LEGACY_PORT: u16 = 8001;

/// Errors raised when a configuration is missing a required value.
///
/// These are fatal: retrying with the same configuration cannot succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No IP address was supplied.
    #[error("TV IP address is required")]
    MissingIp,
    /// A MAC address is needed (wake) but none is known.
    #[error("TV MAC address is required")]
    MissingMac,
    /// The MAC address could not be parsed.
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),
}

/// Everything a control session needs to know about its TV.
///
/// # Example
///
/// ```rust
/// use tv_remote_core::SessionConfig;
///
/// let cfg = SessionConfig::new("10.0.0.5");
/// assert_eq!(cfg.port, 8002);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Dotted network address of the TV.  Required.
    pub ip: String,
    /// Hardware address, only needed for waking the TV.
    pub mac: String,
    /// Name the TV registers this client under; also the token cache key.
    pub app_name: String,
    /// Control-channel port: [`DEFAULT_PORT`] or [`LEGACY_PORT`].
    pub port: u16,
    /// Human label persisted with the last-connected device.
    pub device_name: Option<String>,
    /// Upper bound on opening the TCP connection.
    pub connect_timeout: Duration,
    /// Upper bound on the WebSocket upgrade plus the first channel message.
    pub handshake_timeout: Duration,
    /// Pause after every key send before the next command may go out.
    pub inter_key_delay: Duration,
    /// Pause between a fresh handshake and the first click on the legacy port.
    pub legacy_settle_delay: Duration,
}

impl SessionConfig {
    /// Creates a configuration for `ip` with every other field defaulted.
    ///
    /// | Field               | Default             |
    /// |---------------------|---------------------|
    /// | mac                 | `00:00:00:00:00:00` |
    /// | app_name            | `SamsungTvRemote`   |
    /// | port                | `8002`              |
    /// | connect_timeout     | 5 seconds           |
    /// | handshake_timeout   | 5 seconds           |
    /// | inter_key_delay     | 60 ms               |
    /// | legacy_settle_delay | 500 ms              |
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: UNKNOWN_MAC.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            port: DEFAULT_PORT,
            device_name: None,
            connect_timeout: Duration::from_millis(5000),
            handshake_timeout: Duration::from_millis(5000),
            inter_key_delay: Duration::from_millis(60),
            legacy_settle_delay: Duration::from_millis(500),
        }
    }

    /// Creates a configuration targeting a discovered or cached device.
    pub fn from_device(device: &Device) -> Self {
        let mut cfg = Self::new(device.ip.clone());
        cfg.mac = device.mac.clone();
        cfg.device_name = Some(device.friendly_name.clone());
        cfg
    }

    /// Sets the control-channel port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the hardware address.
    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = mac.into();
        self
    }

    /// Sets the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sets both the connect and the handshake timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the pause that follows every key send.
    pub fn with_inter_key_delay(mut self, delay: Duration) -> Self {
        self.inter_key_delay = delay;
        self
    }

    /// Returns `true` when the port speaks the plain (non-TLS) protocol.
    pub fn is_legacy_port(&self) -> bool {
        self.port == LEGACY_PORT
    }

    /// The `ip:port` endpoint used as the token cache key.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// The descriptor persisted to the device cache after a handshake.
    pub fn device(&self) -> Device {
        Device::new(
            self.device_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            self.ip.clone(),
            self.mac.clone(),
        )
    }

    /// Checks the invariants a session relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingIp`] if `ip` is empty.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ip.trim().is_empty() {
            return Err(ConfigurationError::MissingIp);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
