//! WakeOrchestrator: powers a sleeping TV on and checks that it came up.
//!
//! ```text
//! is_alive(ip)? ── yes ──► done (no packet sent)
//!      │ no
//!      ▼
//! send magic packets ──► wait grace period ──► is_alive(ip)? ── no ──► DidNotWake
//!                                                   │ yes
//!                                                   ▼
//!                                                  done
//! ```
//!
//! This is a single wake attempt with a single post-wait check, never a loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use tv_remote_core::{ConfigurationError, MacAddress};

/// Default wait between sending the wake packets and re-checking liveness.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Error type for the wake use case.
#[derive(Debug, Error)]
pub enum WakeError {
    /// No usable MAC address; nothing can be sent.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The magic packet could not be broadcast.
    #[error("failed to send wake packet: {0}")]
    Send(#[from] std::io::Error),
    /// The TV was still unreachable after the grace period.
    #[error("TV at {ip} did not wake up")]
    DidNotWake { ip: String },
}

/// Checks whether a host answers on the network.
///
/// Implementations never fail: any problem means "not alive".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, ip: &str) -> bool;
}

/// Delivers Wake-on-LAN magic packets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WakeSender: Send + Sync {
    /// Sends the full burst of magic packets for `mac`.
    async fn send_magic_packet(&self, mac: &MacAddress) -> std::io::Result<()>;
}

/// Timing for [`WakeOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeConfig {
    /// How long the TV gets to boot before it is probed again.
    pub grace_period: Duration,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Wakes TVs with the injected probe and sender.
pub struct WakeOrchestrator {
    probe: Arc<dyn LivenessProbe>,
    sender: Arc<dyn WakeSender>,
    config: WakeConfig,
}

impl WakeOrchestrator {
    pub fn new(
        probe: Arc<dyn LivenessProbe>,
        sender: Arc<dyn WakeSender>,
        config: WakeConfig,
    ) -> Self {
        Self {
            probe,
            sender,
            config,
        }
    }

    /// Makes sure the TV at `ip` is powered on.
    ///
    /// Returns immediately, without sending anything, if the TV already
    /// answers.
    ///
    /// # Errors
    ///
    /// - [`WakeError::Configuration`] if `mac` is empty, the unknown
    ///   placeholder, or malformed.
    /// - [`WakeError::Send`] if the packets could not be broadcast.
    /// - [`WakeError::DidNotWake`] if the TV is still down after the grace
    ///   period.
    pub async fn wake(&self, mac: &str, ip: &str) -> Result<(), WakeError> {
        if self.probe.is_alive(ip).await {
            info!("TV at {ip} is already awake");
            return Ok(());
        }

        let mac = MacAddress::parse_required(mac)?;
        info!("waking TV at {ip} ({mac})");
        self.sender.send_magic_packet(&mac).await?;

        tokio::time::sleep(self.config.grace_period).await;

        if self.probe.is_alive(ip).await {
            info!("TV at {ip} is up");
            Ok(())
        } else {
            warn!("TV at {ip} did not answer after {:?}", self.config.grace_period);
            Err(WakeError::DidNotWake { ip: ip.to_string() })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
