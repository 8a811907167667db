//! Control-channel URL, JSON frames, and handshake interpretation.
//!
//! # Message flow
//!
//! ```text
//! client ── WebSocket upgrade (?name=<base64 app>&token=<token>) ──► TV
//! client ◄── {"event":"ms.channel.connect","data":{"token":"…"}} ─── TV
//! client ── {"method":"ms.remote.control","params":{…}} ───────────► TV
//! ```
//!
//! The first inbound frame decides the handshake: `ms.channel.connect` means
//! the channel is authorised, anything else (typically
//! `ms.channel.unauthorized` when the user declines the prompt) is a failure.

use std::io;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::SessionConfig;

/// Path of the remote-control channel on the TV's WebSocket server.
pub const CHANNEL_PATH: &str = "/api/v2/channels/samsung.remote.control";

/// Event name of a successful handshake.
pub const CHANNEL_CONNECT_EVENT: &str = "ms.channel.connect";

/// Method name of a key command.
pub const REMOTE_CONTROL_METHOD: &str = "ms.remote.control";

/// Why a handshake did not produce an open channel.
///
/// The type is `Clone` because one in-flight handshake result is handed to
/// every caller that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Connection timed out")]
    TimedOut,
    #[error("Host is down or service not available")]
    HostDown,
    #[error("Host is unreachable")]
    HostUnreachable,
    /// The first frame was not a channel-connect event.
    #[error("Unexpected handshake message: {0}")]
    UnexpectedMessage(String),
    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The session was disconnected while this handshake was pending.
    #[error("session disconnected before the handshake completed")]
    Aborted,
}

impl HandshakeError {
    /// Classifies an OS-level error raised while opening the transport.
    pub fn from_io(err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            return HandshakeError::TimedOut;
        }
        match err.raw_os_error() {
            Some(code) if code == os_codes::HOST_DOWN => HandshakeError::HostDown,
            Some(code) if code == os_codes::HOST_UNREACHABLE => HandshakeError::HostUnreachable,
            Some(code) if code == os_codes::TIMED_OUT => HandshakeError::TimedOut,
            _ => HandshakeError::Transport(err.to_string()),
        }
    }
}

#[cfg(target_os = "linux")]
mod os_codes {
    pub const TIMED_OUT: i32 = 110;
    pub const HOST_DOWN: i32 = 112;
    pub const HOST_UNREACHABLE: i32 = 113;
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
mod os_codes {
    pub const TIMED_OUT: i32 = 60;
    pub const HOST_DOWN: i32 = 64;
    pub const HOST_UNREACHABLE: i32 = 65;
}

#[cfg(target_os = "windows")]
mod os_codes {
    pub const TIMED_OUT: i32 = 10060;
    pub const HOST_DOWN: i32 = 10064;
    pub const HOST_UNREACHABLE: i32 = 10065;
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "windows"
)))]
mod os_codes {
    pub const TIMED_OUT: i32 = -1;
    pub const HOST_DOWN: i32 = -1;
    pub const HOST_UNREACHABLE: i32 = -1;
}

/// Builds the control-channel URL for `config`.
///
/// `ws://` on the legacy port, `wss://` otherwise.  The application name is
/// base64 encoded into `name`; `token` is appended only when present.
///
/// # Example
///
/// ```rust
/// use tv_remote_core::{protocol::connection_url, SessionConfig};
///
/// let url = connection_url(&SessionConfig::new("10.0.0.5"), None);
/// assert_eq!(
///     url,
///     "wss://10.0.0.5:8002/api/v2/channels/samsung.remote.control?name=U2Ftc3VuZ1R2UmVtb3Rl"
/// );
/// ```
pub fn connection_url(config: &SessionConfig, token: Option<&str>) -> String {
    let scheme = if config.is_legacy_port() { "ws" } else { "wss" };
    let mut url = format!(
        "{scheme}://{}:{}{CHANNEL_PATH}?name={}",
        config.ip,
        config.port,
        STANDARD.encode(config.app_name.as_bytes())
    );
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.push_str("&token=");
        url.push_str(token);
    }
    url
}

/// Outbound key command frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub method: String,
    pub params: RemoteCommandParams,
}

/// Parameters of a key command; field names are fixed by the TV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteCommandParams {
    pub cmd: String,
    pub data_of_cmd: String,
    pub option: bool,
    pub type_of_remote: String,
}

impl RemoteCommand {
    /// A single press-and-release of `key` (e.g. `"KEY_VOLUP"`).
    pub fn click(key: impl Into<String>) -> Self {
        Self {
            method: REMOTE_CONTROL_METHOD.to_string(),
            params: RemoteCommandParams {
                cmd: "Click".to_string(),
                data_of_cmd: key.into(),
                option: false,
                type_of_remote: "SendRemoteKey".to_string(),
            },
        }
    }

    /// Serialises the frame as sent on the wire.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialisation failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound server event frame (`{"event": …, "data": …}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HandshakeReply {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl HandshakeReply {
    /// Interprets the first frame received on a fresh channel.
    ///
    /// Returns the token the TV issued (if any) when the frame is a
    /// channel-connect event.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::UnexpectedMessage`] carrying the raw frame
    /// for anything else, including frames that are not JSON.
    pub fn interpret(frame: &str) -> Result<Option<String>, HandshakeError> {
        let reply: HandshakeReply = serde_json::from_str(frame)
            .map_err(|_| HandshakeError::UnexpectedMessage(frame.to_string()))?;
        if !reply.is_channel_connect() {
            return Err(HandshakeError::UnexpectedMessage(frame.to_string()));
        }
        Ok(reply.token())
    }

    pub fn is_channel_connect(&self) -> bool {
        self.event.as_deref() == Some(CHANNEL_CONNECT_EVENT)
    }

    /// The `data.token` field, accepting string or numeric encodings.
    pub fn token(&self) -> Option<String> {
        match self.data.as_ref()?.get("token")? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
