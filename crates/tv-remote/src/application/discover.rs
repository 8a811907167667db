//! Device lookup use cases built on discovery and the cache.
//!
//! - [`discover_known_devices`] runs a discovery pass and folds the result
//!   into the cache's known-device list.
//! - [`resolve_target`] picks the TV a command should go to: the first device
//!   that answers discovery, else the device used last time.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use tv_remote_core::{domain::device::upsert, Device};

use crate::application::store::TokenStore;

/// Finds TVs on the local network.
///
/// Implementations never fail: any error yields an empty list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Returns the devices found, deduplicated by identity key.
    async fn discover(&self) -> Vec<Device>;
}

/// Where a resolved target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// The address was given explicitly (flag, environment or settings).
    Configured,
    /// The device answered discovery just now, so it is powered on.
    Discovered,
    /// Nothing answered; this is the last device a session connected to.
    LastConnected,
}

/// The device a command should be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub device: Device,
    pub source: TargetSource,
}

/// Runs discovery and merges the result into the known-device list.
///
/// Returns every known device, with freshly discovered entries replacing
/// their older records.  A failed cache write is logged and ignored.
pub async fn discover_known_devices(
    discovery: &dyn DeviceDiscovery,
    store: &dyn TokenStore,
) -> Vec<Device> {
    let found = discovery.discover().await;
    info!("discovery found {} device(s)", found.len());

    if !found.is_empty() {
        if let Err(e) = store.remember_devices(&found) {
            warn!("could not update known devices: {e}");
        }
    }

    let mut known = store.known_devices();
    // Keep fresh results even when the store write failed.
    for device in found {
        upsert(&mut known, device);
    }
    known
}

/// Picks the TV to talk to.
///
/// Returns `None` when discovery finds nothing and no device was cached.
pub async fn resolve_target(
    discovery: &dyn DeviceDiscovery,
    store: &dyn TokenStore,
) -> Option<ResolvedTarget> {
    if let Some(device) = discovery.discover().await.into_iter().next() {
        debug!("resolved target by discovery: {device}");
        return Some(ResolvedTarget {
            device,
            source: TargetSource::Discovered,
        });
    }

    let device = store.last_device()?;
    info!("no TV answered discovery, falling back to last connected: {device}");
    Some(ResolvedTarget {
        device,
        source: TargetSource::LastConnected,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
