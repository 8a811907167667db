//! Domain entities for the TV remote client.
//!
//! This module contains pure types and rules with no infrastructure
//! dependencies.  Code in the outer crates (network adapters, cache files,
//! the CLI) depends on these types, but nothing in here depends on them.
//!
//! - **`device`** – the immutable descriptor of a discovered or cached TV.
//! - **`config`** – the validated configuration a control session is built from.
//! - **`session_state`** – the explicit `Disconnected → Connecting → Connected`
//!   state machine with a pure transition function.
//! - **`attempt`** – the counter that labels every connection attempt so stale
//!   handshake results can be told apart from the current one.

pub mod attempt;
pub mod config;
pub mod device;
pub mod session_state;
