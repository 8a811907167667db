//! RemoteSession: the control-channel session with one TV.
//!
//! A session owns the connection lifecycle.  Every [`RemoteSession::send_key`]
//! call first makes sure a channel is open, performing the handshake when
//! needed, then writes one key command frame.
//!
//! # Single-flight connecting
//!
//! The lifecycle is the explicit [`SessionState`] machine from
//! `tv_remote_core`.  While a handshake is in flight the state holds a
//! [`Shared`] future; a concurrent caller that finds the session `Connecting`
//! awaits a clone of that future instead of opening a second transport, and a
//! `Connected` session hands out its channel directly.  Only a caller that
//! finds the session `Disconnected` builds a candidate future; it is lazy, so
//! a candidate that loses the race is dropped without ever being polled.
//!
//! # Architecture
//!
//! The session depends only on the [`ChannelConnector`] / [`ControlChannel`]
//! traits and the [`TokenStore`].  The WebSocket implementation lives in
//! `infrastructure::network::control_channel`; tests inject fakes.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tv_remote_core::{
    protocol::connection_url, transition, AttemptCounter, AttemptId, ConfigurationError, Effect,
    HandshakeError, HandshakeReply, RemoteCommand, SessionConfig, SessionEvent, SessionState,
};

use crate::application::store::TokenStore;

/// Failure on a channel that is already open.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the channel.
    #[error("channel closed by peer")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening the channel failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    /// Writing a command to the open channel failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode key command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An open, text-framed control channel.
///
/// Infrastructure implementations wrap a WebSocket; test implementations
/// record the frames they are given.
#[async_trait]
pub trait ControlChannel: Send {
    /// Waits for the next text frame.  `Ok(None)` means the peer closed.
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Writes one text frame.
    async fn send_text(&mut self, frame: String) -> Result<(), TransportError>;

    /// Closes the channel.  Errors while closing are ignored.
    async fn close(&mut self);
}

/// Opens control channels.
///
/// Implementations apply `config.connect_timeout` to establishing the
/// connection and `config.handshake_timeout` to the protocol upgrade, and
/// classify failures into [`HandshakeError`] kinds.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn open(
        &self,
        url: &str,
        config: &SessionConfig,
    ) -> Result<Box<dyn ControlChannel>, HandshakeError>;
}

/// The open channel, shared between the state and in-flight senders.
pub type SharedChannel = Arc<Mutex<Box<dyn ControlChannel>>>;

#[derive(Clone)]
struct HandshakeOutcome {
    channel: SharedChannel,
    /// Token issued during this handshake, if it was newly stored.
    issued_token: Option<String>,
}

type PendingHandshake = Shared<BoxFuture<'static, Result<HandshakeOutcome, HandshakeError>>>;

type State = SessionState<PendingHandshake, SharedChannel>;

/// Control session with a single TV.
///
/// All methods take `&self`; wrap the session in an [`Arc`] to use it from
/// several tasks.
pub struct RemoteSession {
    config: SessionConfig,
    connector: Arc<dyn ChannelConnector>,
    store: Arc<dyn TokenStore>,
    token: StdMutex<Option<String>>,
    state: StdMutex<State>,
    attempts: AttemptCounter,
}

impl RemoteSession {
    /// Creates a disconnected session for `config`, loading any cached token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingIp`] when `config.ip` is empty.
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn ChannelConnector>,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let token = store.token(&config.app_name, &config.ip, config.port);
        match &token {
            Some(_) => info!("found cached token for {}", config.endpoint()),
            None => info!("no cached token for {}, the TV will ask for approval", config.endpoint()),
        }

        Ok(Self {
            config,
            connector,
            store,
            token: StdMutex::new(token),
            state: StdMutex::new(SessionState::Disconnected),
            attempts: AttemptCounter::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current authorisation token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The URL the next handshake will connect to.
    pub fn connection_url(&self) -> String {
        connection_url(&self.config, self.token().as_deref())
    }

    /// Short label of the lifecycle state: `disconnected`, `connecting` or
    /// `connected`.
    pub fn state(&self) -> &'static str {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).name()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).is_connected()
    }

    /// Sends one key press (e.g. `"KEY_VOLUP"`), connecting first if needed.
    ///
    /// An empty key is ignored.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Handshake`] if the channel could not be opened.
    /// - [`SessionError::Transport`] if the frame could not be written; the
    ///   channel is torn down and the next call reconnects.
    pub async fn send_key(&self, key: &str) -> Result<(), SessionError> {
        if key.is_empty() {
            return Ok(());
        }

        let frame = RemoteCommand::click(key).to_json()?;
        let (attempt, channel, fresh) = self.ensure_channel().await?;

        if fresh && self.config.is_legacy_port() {
            tokio::time::sleep(self.config.legacy_settle_delay).await;
        }

        info!("sending key {key}");
        let result = channel.lock().await.send_text(frame).await;
        if let Err(e) = result {
            warn!("sending {key} failed: {e}");
            self.run_effect(self.apply(SessionEvent::ChannelLost { attempt }))
                .await;
            return Err(e.into());
        }

        tokio::time::sleep(self.config.inter_key_delay).await;
        Ok(())
    }

    /// Sends `keys` one at a time, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first key that fails and returns its error; the remaining
    /// keys are not sent.
    pub async fn send_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<(), SessionError> {
        for key in keys {
            self.send_key(key.as_ref()).await?;
        }
        Ok(())
    }

    /// Closes the channel and returns to `Disconnected`.
    ///
    /// A handshake still in flight is abandoned: its callers receive
    /// [`HandshakeError::Aborted`] and the channel it opens is closed.
    pub async fn disconnect(&self) {
        info!("disconnecting from {}", self.config.endpoint());
        self.run_effect(self.apply(SessionEvent::DisconnectRequested))
            .await;
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Returns an open channel, the attempt that opened it, and whether this
    /// call awaited the handshake (as opposed to reusing an open channel).
    async fn ensure_channel(&self) -> Result<(AttemptId, SharedChannel, bool), SessionError> {
        let effect = match self.current_channel() {
            Some(effect) => effect,
            None => {
                let candidate = self.attempts.next();
                let pending = self.start_handshake(candidate);
                self.apply(SessionEvent::ConnectRequested {
                    attempt: candidate,
                    pending,
                })
            }
        };

        match effect {
            Effect::Use { attempt, channel } => Ok((attempt, channel, false)),
            Effect::Await { attempt, pending } => {
                match pending.await {
                    Ok(outcome) => {
                        if let Some(token) = outcome.issued_token {
                            let mut current =
                                self.token.lock().unwrap_or_else(PoisonError::into_inner);
                            current.get_or_insert(token);
                        }
                        let effect = self.apply(SessionEvent::HandshakeSucceeded {
                            attempt,
                            channel: Arc::clone(&outcome.channel),
                        });
                        if let Effect::Close(stale) = effect {
                            debug!("handshake {attempt} finished after disconnect");
                            close_channel(stale).await;
                            return Err(HandshakeError::Aborted.into());
                        }
                        Ok((attempt, outcome.channel, true))
                    }
                    Err(e) => {
                        self.apply(SessionEvent::HandshakeFailed { attempt });
                        warn!("handshake {attempt} with {} failed: {e}", self.config.endpoint());
                        Err(e.into())
                    }
                }
            }
            Effect::None | Effect::Close(_) => Err(HandshakeError::Aborted.into()),
        }
    }

    /// Serves a connect request from the current state when no new handshake
    /// is needed: the open channel, or the handshake already in flight.
    fn current_channel(&self) -> Option<Effect<PendingHandshake, SharedChannel>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SessionState::Connected { attempt, channel } => Some(Effect::Use {
                attempt: *attempt,
                channel: Arc::clone(channel),
            }),
            SessionState::Connecting { attempt, pending } => {
                debug!("joining in-flight handshake {attempt}");
                Some(Effect::Await {
                    attempt: *attempt,
                    pending: pending.clone(),
                })
            }
            SessionState::Disconnected => None,
        }
    }

    /// Builds the (not yet polled) handshake future for `attempt`.
    fn start_handshake(&self, attempt: AttemptId) -> PendingHandshake {
        let token = self.token();
        let url = connection_url(&self.config, token.as_deref());
        let connector = Arc::clone(&self.connector);
        let store = Arc::clone(&self.store);
        let config = self.config.clone();

        async move { handshake(attempt, connector, store, config, url, token.is_some()).await }
            .boxed()
            .shared()
    }

    fn apply(
        &self,
        event: SessionEvent<PendingHandshake, SharedChannel>,
    ) -> Effect<PendingHandshake, SharedChannel> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let from = state.name();
        let (next, effect) = transition(std::mem::take(&mut *state), event);
        if from != next.name() {
            debug!("session {from} -> {}", next.name());
        }
        *state = next;
        effect
    }

    async fn run_effect(&self, effect: Effect<PendingHandshake, SharedChannel>) {
        if let Effect::Close(channel) = effect {
            close_channel(channel).await;
        }
    }
}

async fn close_channel(channel: SharedChannel) {
    channel.lock().await.close().await;
}

/// Opens the transport, waits for the first frame and interprets it.
async fn handshake(
    attempt: AttemptId,
    connector: Arc<dyn ChannelConnector>,
    store: Arc<dyn TokenStore>,
    config: SessionConfig,
    url: String,
    had_token: bool,
) -> Result<HandshakeOutcome, HandshakeError> {
    info!("connecting to TV at {} (attempt {attempt})", config.endpoint());
    debug!("control channel url: {url}");

    let mut channel = connector.open(&url, &config).await?;

    let first = match tokio::time::timeout(config.handshake_timeout, channel.recv_text()).await {
        Ok(Ok(Some(frame))) => frame,
        Ok(Ok(None)) => {
            channel.close().await;
            return Err(HandshakeError::Transport(
                "channel closed before the handshake completed".to_string(),
            ));
        }
        Ok(Err(e)) => {
            channel.close().await;
            return Err(HandshakeError::Transport(e.to_string()));
        }
        Err(_) => {
            channel.close().await;
            return Err(HandshakeError::TimedOut);
        }
    };

    let offered = match HandshakeReply::interpret(&first) {
        Ok(token) => token,
        Err(e) => {
            channel.close().await;
            return Err(e);
        }
    };
    info!("connected to TV at {}", config.endpoint());

    let issued_token = match offered {
        Some(token) if !had_token => {
            info!("TV issued a new token");
            if let Err(e) = store.save_token(&config.app_name, &config.ip, config.port, &token) {
                warn!("could not persist token: {e}");
            }
            Some(token)
        }
        _ => None,
    };

    if let Err(e) = store.save_device(&config.device()) {
        warn!("could not persist last connected device: {e}");
    }

    Ok(HandshakeOutcome {
        channel: Arc::new(Mutex::new(channel)),
        issued_token,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
