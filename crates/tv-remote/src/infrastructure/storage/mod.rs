//! Storage infrastructure: the JSON token/device cache and the TOML settings
//! file.
//!
//! - **`cache`**  – [`JsonCache`](cache::JsonCache), the file-backed
//!   `TokenStore`.  Read failures degrade to "nothing cached".
//! - **`config`** – User settings and the platform directories both files
//!   live in.

pub mod cache;
pub mod config;
