//! SSDP discovery query and reply parsing.
//!
//! # How SSDP discovery works
//!
//! 1. The client sends one `M-SEARCH` request to the multicast group
//!    `239.255.255.250:1900`, naming the service type it is interested in.
//! 2. Every device advertising that service answers with a unicast UDP reply
//!    whose body looks like an HTTP response header block:
//!
//! ```text
//! HTTP/1.1 200 OK
//! LOCATION: http://192.168.1.20:8080/dd.xml
//! SERVER: Samsung-Linux/4.1, UPnP/1.0, Samsung_UPnP_SDK/1.0
//! ST: urn:dial-multiscreen-org:service:dial:1
//! WAKEUP: MAC=f4:7b:09:aa:bb:cc;Timeout=10
//! ```
//!
//! 3. `LOCATION` points at an XML device description that carries the
//!    human-readable `<friendlyName>`; `WAKEUP` (when present) carries the
//!    hardware address needed for Wake-on-LAN.
//!
//! This module only deals with text.  Sockets and HTTP live in the
//! `tv-remote` crate.

/// Standard SSDP multicast group.
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// Standard SSDP port.
pub const SSDP_PORT: u16 = 1900;

/// Service type advertised by the TVs (DIAL multiscreen service).
pub const DIAL_SEARCH_TARGET: &str = "urn:dial-multiscreen-org:service:dial:1";

/// Header value marker identifying the manufacturer we can control.
pub const DEFAULT_MANUFACTURER: &str = "Samsung";

/// Maximum wait (seconds) devices may randomise their reply over.
const MX_SECONDS: u8 = 10;

/// Builds the `M-SEARCH` request for `search_target`.
///
/// Lines are CRLF terminated and the request ends with an empty line.
pub fn m_search(search_target: &str) -> String {
    [
        "M-SEARCH * HTTP/1.1".to_string(),
        format!("HOST: {SSDP_MULTICAST_ADDR}:{SSDP_PORT}"),
        "MAN: \"ssdp:discover\"".to_string(),
        format!("MX: {MX_SECONDS}"),
        format!("ST: {search_target}"),
        String::new(),
        String::new(),
    ]
    .join("\r\n")
}

/// The `KEY: value` header lines of one SSDP reply.
///
/// Keys are stored upper-cased, so lookups are case-insensitive.  When a key
/// repeats, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsdpHeaders {
    entries: Vec<(String, String)>,
}

impl SsdpHeaders {
    /// Parses a reply body.
    ///
    /// Each line is split at its first colon; the part before is the key and
    /// the part after is the value, both trimmed.  Lines without a colon (the
    /// status line, blank lines, garbage) are ignored.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for line in text.split('\n') {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_uppercase();
            if key.is_empty() {
                continue;
            }
            let value = value.trim().to_string();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        Self { entries }
    }

    /// Returns the value for `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Number of parsed headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` if any header value mentions `manufacturer` (case-insensitive).
    ///
    /// Replies without such a header come from other UPnP devices (routers,
    /// media servers) and must be ignored.
    pub fn identifies_manufacturer(&self, manufacturer: &str) -> bool {
        let needle = manufacturer.to_ascii_lowercase();
        self.entries
            .iter()
            .any(|(_, v)| v.to_ascii_lowercase().contains(&needle))
    }

    /// The device description URL, if advertised.
    pub fn location(&self) -> Option<&str> {
        self.get("LOCATION").filter(|v| !v.is_empty())
    }

    /// The hardware address encoded in the `WAKEUP` header, if any.
    pub fn wake_mac(&self) -> Option<String> {
        self.get("WAKEUP").and_then(parse_wakeup_mac)
    }
}

/// Extracts the address from a `WAKEUP` header value such as
/// `MAC=f4:7b:09:aa:bb:cc;Timeout=10`.
fn parse_wakeup_mac(value: &str) -> Option<String> {
    let start = value.find("MAC=")? + "MAC=".len();
    let mac: String = value[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit() || *c == ':')
        .collect();
    (!mac.is_empty()).then_some(mac)
}

/// Returns the first `<friendlyName>` element of a device description.
///
/// The tag match is case-insensitive.  Basic XML entities are decoded.
/// Returns `None` when the element is missing or empty.
pub fn extract_friendly_name(xml: &str) -> Option<String> {
    const OPEN: &str = "<friendlyname>";
    const CLOSE: &str = "</friendlyname>";

    // ASCII lower-casing keeps byte offsets identical to `xml`.
    let lower = xml.to_ascii_lowercase();
    let start = lower.find(OPEN)? + OPEN.len();
    let end = start + lower[start..].find(CLOSE)?;
    let name = decode_entities(xml[start..end].trim());
    (!name.is_empty()).then_some(name)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
