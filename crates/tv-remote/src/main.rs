//! `tv-remote` command-line entry point.
//!
//! Wires the infrastructure adapters into the application use cases:
//!
//! ```text
//! main()
//!  └─ load settings, install tracing subscriber, open the JSON cache
//!  └─ run the subcommand
//!       ├─ discover  -- SsdpDiscovery + discover_known_devices
//!       ├─ send      -- resolve target, (wake), RemoteSession::send_keys
//!       ├─ wake      -- resolve target, WakeOrchestrator::wake
//!       ├─ last      -- print the cached last-connected device
//!       └─ init      -- write the settings file
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tv_remote::application::discover::{
    discover_known_devices, resolve_target, ResolvedTarget, TargetSource,
};
use tv_remote::application::session::RemoteSession;
use tv_remote::application::store::{InMemoryStore, TokenStore};
use tv_remote::application::wake::WakeOrchestrator;
use tv_remote::infrastructure::network::control_channel::TungsteniteConnector;
use tv_remote::infrastructure::network::discovery::{DiscoveryPolicy, SsdpDiscovery};
use tv_remote::infrastructure::network::liveness::PingProbe;
use tv_remote::infrastructure::network::wake_on_lan::UdpWakeSender;
use tv_remote::infrastructure::storage::cache::JsonCache;
use tv_remote::infrastructure::storage::config::{
    load_settings, load_settings_from, save_settings, save_settings_to, settings_file_path,
    Settings, SettingsError,
};
use tv_remote_core::domain::device::is_known_mac;
use tv_remote_core::{Device, SessionConfig, UNKNOWN_MAC};

/// Remote control for Samsung smart TVs on the local network.
#[derive(Debug, Parser)]
#[command(name = "tv-remote", version, about)]
struct Cli {
    /// TV address; skips discovery.
    #[arg(long, env = "TV_REMOTE_IP")]
    ip: Option<String>,

    /// TV hardware address, needed to wake it.
    #[arg(long, env = "TV_REMOTE_MAC")]
    mac: Option<String>,

    /// Control-channel port (8002, or 8001 on 2016/2017 models).
    #[arg(long, env = "TV_REMOTE_PORT")]
    port: Option<u16>,

    /// Application name shown in the TV's approval prompt.
    #[arg(long, env = "TV_REMOTE_NAME")]
    name: Option<String>,

    /// Connect and handshake timeout in milliseconds.
    #[arg(long = "timeout-ms", env = "TV_REMOTE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Settings file to use instead of the platform default.
    #[arg(long, env = "TV_REMOTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List TVs found on the network together with previously seen ones.
    Discover {
        /// Listening window in milliseconds.
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
        /// Listen for the whole window instead of stopping at the first TV.
        #[arg(long)]
        full_window: bool,
    },
    /// Send key codes (e.g. KEY_VOLUP KEY_MUTE) in order.
    Send {
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },
    /// Power the TV on with Wake-on-LAN.
    Wake,
    /// Show the last TV a session connected to.
    Last,
    /// Write the settings file, folding in --ip, --mac, --port, --name and
    /// --timeout-ms.
    Init {
        /// Replace an existing settings file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = read_settings(&cli)?;

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store: Arc<dyn TokenStore> = match JsonCache::open_default() {
        Ok(cache) => {
            info!("using cache {}", cache.path().display());
            Arc::new(cache)
        }
        Err(e) => {
            warn!("no cache directory ({e}); nothing will be remembered");
            Arc::new(InMemoryStore::new())
        }
    };

    match &cli.command {
        Command::Discover {
            timeout_ms,
            full_window,
        } => discover(&settings, store.as_ref(), *timeout_ms, *full_window).await,
        Command::Send { keys } => send(&cli, &settings, store, keys).await,
        Command::Wake => wake(&cli, &settings, store.as_ref()).await,
        Command::Last => {
            let device = store
                .last_device()
                .ok_or_else(|| anyhow!("no TV has been connected yet"))?;
            println!("{device}");
            Ok(())
        }
        Command::Init { force } => init(&cli, settings, *force),
    }
}

fn read_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let loaded = match &cli.config {
        Some(path) => load_settings_from(path),
        None => match load_settings() {
            Err(SettingsError::NoPlatformDir) => Ok(Settings::default()),
            other => other,
        },
    };
    loaded.context("failed to load settings")
}

fn init(cli: &Cli, mut settings: Settings, force: bool) -> anyhow::Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => settings_file_path().context("no platform config directory")?,
    };
    if path.exists() && !force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }

    if cli.ip.is_some() {
        settings.tv.ip = cli.ip.clone();
    }
    if cli.mac.is_some() {
        settings.tv.mac = cli.mac.clone();
    }
    if let Some(port) = cli.port {
        settings.tv.port = port;
    }
    if let Some(name) = &cli.name {
        settings.tv.app_name = name.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        settings.tv.timeout_ms = ms;
    }

    match &cli.config {
        Some(path) => save_settings_to(path, &settings),
        None => save_settings(&settings),
    }
    .context("failed to write settings")?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn discover(
    settings: &Settings,
    store: &dyn TokenStore,
    timeout_ms: Option<u64>,
    full_window: bool,
) -> anyhow::Result<()> {
    let mut config = settings.discovery_config();
    if let Some(ms) = timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if full_window {
        config = config.with_policy(DiscoveryPolicy::FullWindow);
    }

    let devices = discover_known_devices(&SsdpDiscovery::new(config), store).await;
    if devices.is_empty() {
        println!("no TVs found");
    }
    for device in devices {
        println!("{device}");
    }
    Ok(())
}

async fn send(
    cli: &Cli,
    settings: &Settings,
    store: Arc<dyn TokenStore>,
    keys: &[String],
) -> anyhow::Result<()> {
    let target = resolve(cli, settings, store.as_ref()).await?;
    info!("target: {}", target.device);

    if target.source == TargetSource::LastConnected && is_known_mac(&target.device.mac) {
        wake_orchestrator(settings)
            .wake(&target.device.mac, &target.device.ip)
            .await
            .context("failed to wake TV")?;
    }

    let connector = TungsteniteConnector::new().context("failed to build TLS configuration")?;
    let session = RemoteSession::new(
        session_config(cli, settings, &target.device),
        Arc::new(connector),
        store,
    )
    .context("invalid session configuration")?;

    let result = session.send_keys(keys).await;
    session.disconnect().await;
    result.context("failed to send keys")
}

async fn wake(cli: &Cli, settings: &Settings, store: &dyn TokenStore) -> anyhow::Result<()> {
    let target = resolve(cli, settings, store).await?;
    wake_orchestrator(settings)
        .wake(&target.device.mac, &target.device.ip)
        .await
        .with_context(|| format!("failed to wake {}", target.device))?;
    println!("{} is awake", target.device);
    Ok(())
}

/// Picks the TV: flags or settings first, then discovery, then the cache.
async fn resolve(
    cli: &Cli,
    settings: &Settings,
    store: &dyn TokenStore,
) -> anyhow::Result<ResolvedTarget> {
    let mac_override = cli.mac.clone().or_else(|| settings.tv.mac.clone());

    if let Some(ip) = cli.ip.clone().or_else(|| settings.tv.ip.clone()) {
        let last = store.last_device().filter(|d| d.ip == ip);
        let name = last
            .as_ref()
            .map(|d| d.friendly_name.clone())
            .unwrap_or_else(|| ip.clone());
        let mac = mac_override
            .or_else(|| last.map(|d| d.mac))
            .unwrap_or_else(|| UNKNOWN_MAC.to_string());
        return Ok(ResolvedTarget {
            device: Device::new(name, ip, mac),
            source: TargetSource::Configured,
        });
    }

    let discovery = SsdpDiscovery::new(settings.discovery_config());
    let mut target = resolve_target(&discovery, store)
        .await
        .ok_or_else(|| anyhow!("no TV found on the network and none connected before"))?;
    if let Some(mac) = mac_override {
        if !target.device.has_known_mac() {
            target.device.mac = mac;
        }
    }
    Ok(target)
}

fn session_config(cli: &Cli, settings: &Settings, device: &Device) -> SessionConfig {
    let mut config = settings.apply_to_session(SessionConfig::from_device(device));
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(name) = &cli.name {
        config = config.with_app_name(name.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    config
}

fn wake_orchestrator(settings: &Settings) -> WakeOrchestrator {
    WakeOrchestrator::new(
        Arc::new(PingProbe::new()),
        Arc::new(UdpWakeSender::new(settings.wake_on_lan_config())),
        settings.wake_config(),
    )
}
