//! Wake-on-LAN magic packets.
//!
//! A magic packet is 102 bytes: six `0xFF` bytes followed by the target's
//! 6-byte hardware address repeated sixteen times.  A sleeping NIC that sees
//! its own address in that pattern powers the machine on.

use std::fmt;
use std::str::FromStr;

use crate::domain::config::ConfigurationError;
use crate::domain::device::is_known_mac;

/// Length of a magic packet in bytes.
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// A parsed 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Parses `mac`, treating an empty string or the unknown placeholder as
    /// a missing address.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingMac`] when absent,
    /// [`ConfigurationError::InvalidMac`] when malformed.
    pub fn parse_required(mac: &str) -> Result<Self, ConfigurationError> {
        if !is_known_mac(mac) {
            return Err(ConfigurationError::MissingMac);
        }
        mac.parse()
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = ConfigurationError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff`, or `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidMac(s.to_string());
        let hex: String = s.trim().chars().filter(|c| *c != ':' && *c != '-').collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// A ready-to-send magic packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicPacket([u8; MAGIC_PACKET_LEN]);

impl MagicPacket {
    /// Builds the packet for `mac`.
    pub fn new(mac: &MacAddress) -> Self {
        let mut bytes = [0xFFu8; MAGIC_PACKET_LEN];
        for chunk in bytes[6..].chunks_exact_mut(6) {
            chunk.copy_from_slice(&mac.0);
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
