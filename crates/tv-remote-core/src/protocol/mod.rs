//! Wire formats spoken with the TV.

pub mod control;
pub mod ssdp;
pub mod wol;

pub use control::{
    connection_url, HandshakeError, HandshakeReply, RemoteCommand, CHANNEL_CONNECT_EVENT,
};
pub use ssdp::{extract_friendly_name, m_search, SsdpHeaders};
pub use wol::{MacAddress, MagicPacket};
