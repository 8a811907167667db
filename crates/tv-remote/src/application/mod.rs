//! Application layer use cases for the TV remote client.
//!
//! Use cases in this layer orchestrate the `tv_remote_core` domain types to
//! fulfil a user goal.  They depend only on the traits declared here; the
//! concrete sockets, processes and files are injected from
//! [`crate::infrastructure`], so every use case is unit-testable with fakes.
//!
//! # Sub-modules
//!
//! - **`session`**  – The control-channel session: handshake, token reuse,
//!   single-flight connection sharing and key transmission.
//!
//! - **`wake`**     – Powers a sleeping TV on with Wake-on-LAN and checks that
//!   it came up.
//!
//! - **`discover`** – Merges live discovery results with the device cache and
//!   picks the TV a command should go to.
//!
//! - **`store`**    – The token / device cache contract shared by the above.

pub mod discover;
pub mod session;
pub mod store;
pub mod wake;
