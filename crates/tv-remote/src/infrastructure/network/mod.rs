//! Network infrastructure for the TV remote client.
//!
//! # Sub-modules
//!
//! - **`discovery`**       – Sends the SSDP `M-SEARCH` query, collects replies
//!   within a bounded window and resolves each TV's friendly name over HTTP.
//!
//! - **`control_channel`** – Opens the WebSocket control channel (TLS on the
//!   modern port) and adapts it to the `ControlChannel` trait.
//!
//! - **`liveness`**        – Checks reachability with a single system `ping`.
//!
//! - **`wake_on_lan`**     – Broadcasts Wake-on-LAN magic packets.

pub mod control_channel;
pub mod discovery;
pub mod liveness;
pub mod wake_on_lan;
