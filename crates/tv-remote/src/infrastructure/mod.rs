//! Infrastructure layer for the TV remote client.
//!
//! Contains OS-facing adapters: UDP and WebSocket networking, the `ping`
//! child process, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `tv_remote_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
