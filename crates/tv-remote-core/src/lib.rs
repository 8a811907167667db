//! # tv-remote-core
//!
//! Shared library for the TV remote client containing the device model, the
//! control-session state machine, and the wire formats spoken on the local
//! network.
//!
//! This crate has zero dependencies on sockets, files, or an async runtime.
//! Everything that touches the network lives in the `tv-remote` crate.
//!
//! # Architecture overview
//!
//! The client talks to a television over three different protocols:
//!
//! - **SSDP** – a multicast UDP query/reply exchange used to find devices on
//!   the LAN.  [`protocol::ssdp`] builds the query and parses the replies.
//!
//! - **Control channel** – a WebSocket (TLS on the modern port) carrying small
//!   JSON frames.  [`protocol::control`] builds the connection URL, the key
//!   command frames, and interprets the handshake reply.
//!
//! - **Wake-on-LAN** – a broadcast "magic packet" that powers the device on.
//!   [`protocol::wol`] parses hardware addresses and builds the packet.
//!
//! The [`domain`] module holds the types those protocols move around: the
//! [`Device`] descriptor, the validated [`SessionConfig`], and the explicit
//! [`SessionState`] machine that the session use case drives.

pub mod domain;
pub mod protocol;

pub use domain::attempt::{AttemptCounter, AttemptId};
pub use domain::config::{ConfigurationError, SessionConfig};
pub use domain::device::{Device, UNKNOWN_MAC};
pub use domain::session_state::{transition, Effect, SessionEvent, SessionState};
pub use protocol::control::{HandshakeError, HandshakeReply, RemoteCommand};
pub use protocol::wol::{MacAddress, MagicPacket};
