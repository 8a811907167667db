//! SSDP discovery of TVs on the local network.
//!
//! One `M-SEARCH` datagram is sent to the SSDP multicast group; every reply
//! that arrives before the deadline is parsed with
//! [`SsdpHeaders`](tv_remote_core::protocol::SsdpHeaders).  Replies that do
//! not name the manufacturer are dropped.  For the rest the `LOCATION`
//! description document is fetched to learn the friendly name, and the
//! `WAKEUP` header supplies the MAC address.
//!
//! # Termination
//!
//! [`DiscoveryPolicy::FirstHit`] stops as soon as one device has been
//! accepted; [`DiscoveryPolicy::FullWindow`] keeps listening until the timeout
//! elapses.  Description fetches share the same deadline, so a slow or silent
//! description server never stretches the window, and a sender that has
//! already been accepted is not described again.  Either way the socket is
//! owned by the call and dropped on every exit path.
//!
//! # Errors
//!
//! Discovery never fails.  Socket errors end the pass with an empty list and
//! a failed description fetch keeps the sender address as the name.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use tv_remote_core::{
    domain::device::insert_unique,
    protocol::{
        extract_friendly_name, m_search,
        ssdp::{DEFAULT_MANUFACTURER, DIAL_SEARCH_TARGET, SSDP_PORT},
        SsdpHeaders,
    },
    Device,
};

use crate::application::discover::DeviceDiscovery;

/// Default listening window.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(250);

/// Default bound on fetching one device description document.
pub const DEFAULT_DESCRIPTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Multicast TTL; 2 keeps the query on the local network.
pub const DEFAULT_MULTICAST_TTL: u32 = 2;

const SSDP_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Largest reply datagram we read.
const RECV_BUFFER_SIZE: usize = 4096;

/// When a discovery pass stops listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryPolicy {
    /// Return as soon as one device was found (or when the timeout elapses).
    #[default]
    FirstHit,
    /// Collect replies for the whole timeout.
    FullWindow,
}

/// Settings for one [`SsdpDiscovery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// How long to listen for replies.
    pub timeout: Duration,
    pub policy: DiscoveryPolicy,
    /// Where the `M-SEARCH` is sent; the SSDP multicast group by default.
    pub target: SocketAddr,
    /// Service type named in the `ST` header.
    pub search_target: String,
    /// Replies must mention this in one of their header values.
    pub manufacturer: String,
    pub multicast_ttl: u32,
    pub description_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
            policy: DiscoveryPolicy::FirstHit,
            target: SocketAddr::new(IpAddr::V4(SSDP_GROUP), SSDP_PORT),
            search_target: DIAL_SEARCH_TARGET.to_string(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            description_timeout: DEFAULT_DESCRIPTION_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }
}

/// SSDP-based [`DeviceDiscovery`].
pub struct SsdpDiscovery {
    config: DiscoveryConfig,
    http: reqwest::Client,
}

impl SsdpDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        // Description URLs always point into the LAN.
        let http = reqwest::Client::builder()
            .timeout(config.description_timeout)
            .no_proxy()
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self { config, http }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Runs one discovery pass.
    pub async fn discover(&self) -> Vec<Device> {
        match self.search().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("discovery failed: {e}");
                Vec::new()
            }
        }
    }

    async fn search(&self) -> std::io::Result<Vec<Device>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        socket.set_multicast_ttl_v4(self.config.multicast_ttl)?;

        let query = m_search(&self.config.search_target);
        socket.send_to(query.as_bytes(), self.config.target).await?;
        debug!("M-SEARCH sent to {}", self.config.target);

        let deadline = Instant::now() + self.config.timeout;
        let mut devices = Vec::new();
        let mut accepted: HashSet<IpAddr> = HashSet::new();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let (len, src) =
                match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                    Ok(result) => result?,
                    Err(_) => break,
                };

            let sender = src.ip();
            if accepted.contains(&sender) {
                trace!("repeated SSDP reply from {sender}");
                continue;
            }

            let reply = String::from_utf8_lossy(&buf[..len]).into_owned();
            let Some(device) = self.describe(&reply, sender, deadline).await else {
                continue;
            };
            accepted.insert(sender);

            info!("found {device}");
            if insert_unique(&mut devices, device)
                && self.config.policy == DiscoveryPolicy::FirstHit
            {
                break;
            }
        }

        Ok(devices)
    }

    /// Turns one reply into a device, or `None` if it is not a TV we control.
    ///
    /// The description fetch is cut off at `deadline`; the device is still
    /// returned, named after its address.
    async fn describe(&self, reply: &str, sender: IpAddr, deadline: Instant) -> Option<Device> {
        let headers = SsdpHeaders::parse(reply);
        if !headers.identifies_manufacturer(&self.config.manufacturer) {
            debug!("ignoring SSDP reply from {sender}");
            return None;
        }

        let mut device = Device::from_address(sender.to_string());
        if let Some(location) = headers.location() {
            match tokio::time::timeout_at(deadline, self.fetch_friendly_name(location)).await {
                Ok(Some(name)) => device.friendly_name = name,
                Ok(None) => {}
                Err(_) => debug!("discovery window closed while fetching {location}"),
            }
        }
        if let Some(mac) = headers.wake_mac() {
            device.mac = mac;
        }
        Some(device)
    }

    async fn fetch_friendly_name(&self, location: &str) -> Option<String> {
        let body = match self.http.get(location).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("could not read device description {location}: {e}");
                    return None;
                }
            },
            Err(e) => {
                warn!("could not fetch device description {location}: {e}");
                return None;
            }
        };
        let name = extract_friendly_name(&body);
        if name.is_none() {
            debug!("no friendlyName in {location}");
        }
        name
    }
}

#[async_trait]
impl DeviceDiscovery for SsdpDiscovery {
    async fn discover(&self) -> Vec<Device> {
        SsdpDiscovery::discover(self).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
