//! Token and device cache contract.
//!
//! The cache is an optimisation, never a correctness dependency: readers get
//! `None` / an empty list when anything goes wrong, and writers report their
//! failure so the caller can log it and carry on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tv_remote_core::{domain::device::upsert, Device};

/// Error type for cache writes.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing cache at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache document could not be serialized.
    #[error("failed to serialize cache: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent storage for authorisation tokens and device descriptors.
///
/// Tokens are keyed by application name and `ip:port` endpoint; at most one
/// token exists per pair.  The last-connected device occupies a single slot
/// that every successful handshake overwrites.
pub trait TokenStore: Send + Sync {
    /// Returns the token issued to `app_name` by the TV at `ip:port`.
    fn token(&self, app_name: &str, ip: &str, port: u16) -> Option<String>;

    /// Records `token` for `app_name` at `ip:port`, replacing any previous one.
    fn save_token(&self, app_name: &str, ip: &str, port: u16, token: &str)
        -> Result<(), CacheError>;

    /// The most recently connected device, if one was recorded.
    fn last_device(&self) -> Option<Device>;

    /// Overwrites the last-connected slot with `device`.
    fn save_device(&self, device: &Device) -> Result<(), CacheError>;

    /// Every device seen by discovery so far.
    fn known_devices(&self) -> Vec<Device>;

    /// Adds or replaces `devices` in the known-device list by identity key.
    fn remember_devices(&self, devices: &[Device]) -> Result<(), CacheError>;
}

// ── In-memory store ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryContents {
    tokens: HashMap<(String, String), String>,
    last_device: Option<Device>,
    known: Vec<Device>,
}

/// A [`TokenStore`] that keeps everything in process memory.
///
/// Useful for one-shot tools that must not touch the disk, and as a test
/// double.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<MemoryContents>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> std::sync::MutexGuard<'_, MemoryContents> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for InMemoryStore {
    fn token(&self, app_name: &str, ip: &str, port: u16) -> Option<String> {
        self.contents()
            .tokens
            .get(&(app_name.to_string(), format!("{ip}:{port}")))
            .cloned()
    }

    fn save_token(
        &self,
        app_name: &str,
        ip: &str,
        port: u16,
        token: &str,
    ) -> Result<(), CacheError> {
        self.contents()
            .tokens
            .insert((app_name.to_string(), format!("{ip}:{port}")), token.to_string());
        Ok(())
    }

    fn last_device(&self) -> Option<Device> {
        self.contents().last_device.clone()
    }

    fn save_device(&self, device: &Device) -> Result<(), CacheError> {
        self.contents().last_device = Some(device.clone());
        Ok(())
    }

    fn known_devices(&self) -> Vec<Device> {
        self.contents().known.clone()
    }

    fn remember_devices(&self, devices: &[Device]) -> Result<(), CacheError> {
        let mut contents = self.contents();
        for device in devices {
            upsert(&mut contents.known, device.clone());
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
