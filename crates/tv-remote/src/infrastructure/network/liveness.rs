//! Reachability check through the system `ping` command.
//!
//! One echo request with a one-second reply timeout.  The child process is
//! additionally bounded by an outer timeout and killed if it overruns.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::wake::LivenessProbe;

/// Default upper bound on one probe, including process start-up.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// [`LivenessProbe`] that shells out to `ping`.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl PingProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Builds the single-echo `ping` invocation for this platform.
fn ping_command(ip: &str) -> Command {
    let mut cmd = Command::new("ping");

    #[cfg(target_os = "windows")]
    cmd.args(["-n", "1", "-w", "1000"]);

    #[cfg(not(target_os = "windows"))]
    cmd.args(["-c", "1", "-W", "1"]);

    cmd.arg(ip)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Rejects targets `ping` would read as an option.
fn is_probe_target(ip: &str) -> bool {
    !ip.is_empty() && !ip.starts_with('-') && !ip.chars().any(char::is_whitespace)
}

#[async_trait]
impl LivenessProbe for PingProbe {
    async fn is_alive(&self, ip: &str) -> bool {
        if !is_probe_target(ip) {
            debug!("refusing to ping {ip:?}");
            return false;
        }

        match tokio::time::timeout(self.timeout, ping_command(ip).status()).await {
            Ok(Ok(status)) => {
                debug!("ping {ip}: {status}");
                status.success()
            }
            Ok(Err(e)) => {
                debug!("could not run ping: {e}");
                false
            }
            Err(_) => {
                debug!("ping {ip} timed out");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_command_sends_single_echo_to_target() {
        // Arrange / Act
        let cmd = ping_command("10.0.0.5");
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        // Assert
        assert_eq!(cmd.as_std().get_program(), "ping");
        assert_eq!(args.last().map(String::as_str), Some("10.0.0.5"));
        #[cfg(not(target_os = "windows"))]
        assert_eq!(&args[..4], ["-c", "1", "-W", "1"]);
    }

    #[test]
    fn test_is_probe_target_rejects_option_like_and_empty_input() {
        assert!(is_probe_target("192.168.1.20"));
        assert!(!is_probe_target(""));
        assert!(!is_probe_target("-f"));
        assert!(!is_probe_target("10.0.0.5 -f"));
    }

    #[tokio::test]
    async fn test_is_alive_false_for_invalid_target() {
        let probe = PingProbe::new();
        assert!(!probe.is_alive("").await);
        assert!(!probe.is_alive("--help").await);
    }

    #[tokio::test]
    async fn test_is_alive_false_when_probe_times_out() {
        // A zero budget expires before the child can report.
        let probe = PingProbe::with_timeout(Duration::ZERO);
        assert!(!probe.is_alive("192.0.2.1").await);
    }
}
