//! Wake-on-LAN magic packet broadcaster.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;
use tv_remote_core::{MacAddress, MagicPacket};

use crate::application::wake::WakeSender;

/// Conventional Wake-on-LAN port ("discard").
pub const WOL_PORT: u16 = 9;

/// Settings for [`UdpWakeSender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeOnLanConfig {
    /// Where packets are sent; the limited broadcast address by default.
    pub target: SocketAddr,
    /// How many copies of the packet are sent.
    pub repetitions: u32,
    /// Pause between two copies.
    pub interval: Duration,
}

impl Default for WakeOnLanConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::from((Ipv4Addr::BROADCAST, WOL_PORT)),
            repetitions: 30,
            interval: Duration::from_millis(100),
        }
    }
}

/// [`WakeSender`] that broadcasts over UDP.
#[derive(Debug, Clone, Default)]
pub struct UdpWakeSender {
    config: WakeOnLanConfig,
}

impl UdpWakeSender {
    pub fn new(config: WakeOnLanConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WakeSender for UdpWakeSender {
    async fn send_magic_packet(&self, mac: &MacAddress) -> std::io::Result<()> {
        let packet = MagicPacket::new(mac);
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        for i in 0..self.config.repetitions {
            if i > 0 {
                tokio::time::sleep(self.config.interval).await;
            }
            socket.send_to(packet.as_bytes(), self.config.target).await?;
        }
        debug!(
            "sent {} magic packet(s) for {mac} to {}",
            self.config.repetitions, self.config.target
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
