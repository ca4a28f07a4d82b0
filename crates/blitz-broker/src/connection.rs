//! Supervised WebSocket connection.
//!
//! Owns the socket lifecycle: handshake sequence, heartbeating, the
//! read/write message loop, and reconnection with an injectable fixed-delay
//! policy. Inbound frames are first offered to the pending-request map;
//! unconsumed frames (pushes) flow out through the frame channel.

use crate::auth::SessionToken;
use crate::error::{BrokerError, BrokerResult};
use crate::message::{inner, names, Frame, WireRequest};
use crate::pending::PendingRequests;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Socket open, identity frame sent.
    Authenticated,
    /// Position-update subscription sent; fully operational.
    Subscribed,
    Reconnecting,
}

/// Reconnection policy.
///
/// The delay is fixed (no backoff growth); the policy is injectable so
/// tests can bound reconnect storms deterministically.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay between attempts.
    pub delay_ms: u64,
    /// Maximum attempts (0 = retry forever).
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: 5000,
            max_attempts: 0, // Infinite
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL (the session token is appended as a query parameter).
    pub ws_url: String,
    /// Heartbeat interval.
    pub heartbeat_interval_ms: u64,
    /// Delay after the profile request before the balances request.
    pub balances_delay_ms: u64,
    /// Delay after the balances request before the position subscription.
    pub subscribe_delay_ms: u64,
    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            heartbeat_interval_ms: 30_000,
            balances_delay_ms: 1000,
            subscribe_delay_ms: 1000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Supervised connection to the brokerage socket.
pub struct Connection {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    pending: Arc<PendingRequests>,
    /// Outbound sender handed to writers (client facade).
    outbound_tx: mpsc::Sender<String>,
    /// Outbound receiver, consumed by the message loop.
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<String>>>,
    /// Unconsumed (push) frames flow to the client dispatcher.
    frame_tx: mpsc::Sender<Frame>,
    shutdown: CancellationToken,
}

impl Connection {
    pub fn new(
        config: ConnectionConfig,
        pending: Arc<PendingRequests>,
        frame_tx: mpsc::Sender<Frame>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(100);
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            pending,
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            frame_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// A cloneable outbound sender for writers.
    pub fn writer(&self) -> mpsc::Sender<String> {
        self.outbound_tx.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Fully operational: handshake completed through the subscription step.
    pub fn is_subscribed(&self) -> bool {
        self.state() == ConnectionState::Subscribed
    }

    /// Socket open (identity frame sent), subscription possibly pending.
    pub fn is_online(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Authenticated | ConnectionState::Subscribed
        )
    }

    /// Request a graceful disconnect. Suppresses reconnection.
    pub fn disconnect(&self) {
        info!("Connection disconnect requested");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Connect and run the message loop, reconnecting per policy.
    ///
    /// Returns when explicitly disconnected, or with an error when the
    /// reconnect budget (if bounded) is exhausted. Must not be invoked
    /// concurrently with another open attempt on the same instance.
    pub async fn connect(&self, token: &SessionToken) -> BrokerResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            match self.try_connect(token).await {
                Ok(()) => info!("Broker connection closed"),
                Err(e) => error!(?e, "Broker connection error"),
            }

            // In-flight listeners are invalidated by the disconnect; their
            // callers observe timeouts independently.
            self.pending.clear();

            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            attempt += 1;
            let policy = &self.config.reconnect;
            if policy.max_attempts > 0 && attempt >= policy.max_attempts {
                error!(attempt, "Reconnect attempts exhausted");
                *self.state.write() = ConnectionState::Disconnected;
                return Err(BrokerError::ReconnectExhausted(attempt));
            }

            *self.state.write() = ConnectionState::Reconnecting;
            let delay = policy.delay_for(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self, token: &SessionToken) -> BrokerResult<()> {
        let url = format!("{}?ssid={}", self.config.ws_url, token.as_str());
        info!(url = %self.config.ws_url, "Connecting to broker WebSocket");

        let (ws_stream, _response) = connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();

        // Identity frame first; the socket is unusable until the gateway
        // has associated the session.
        let identity = serde_json::to_string(&WireRequest::identity(token.as_str()))?;
        write.send(Message::Text(identity.into())).await?;
        *self.state.write() = ConnectionState::Authenticated;
        info!("Broker socket authenticated");

        // Profile request goes out immediately; the reply doubles as the
        // balance-selector bootstrap.
        let profile = WireRequest::send(self.pending.next_id(), inner::profile_request());
        write
            .send(Message::Text(serde_json::to_string(&profile)?.into()))
            .await?;

        // Balances request and position subscription are deferred, matching
        // the gateway's expectation of a settled session first.
        let attempt_token = self.shutdown.child_token();
        let _deferred_guard = attempt_token.clone().drop_guard();
        self.spawn_deferred_handshake(attempt_token);

        let heartbeat_period = Duration::from_millis(self.config.heartbeat_interval_ms);
        let mut heartbeat =
            tokio::time::interval_at(tokio::time::Instant::now() + heartbeat_period, heartbeat_period);

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Broker closed the socket");
                            return Err(BrokerError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Socket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Socket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(text) = outbound {
                        write.send(Message::Text(text.into())).await?;
                    }
                }

                _ = heartbeat.tick() => {
                    let beat = WireRequest::heartbeat(chrono::Utc::now().timestamp_millis());
                    write.send(Message::Text(serde_json::to_string(&beat)?.into())).await?;
                    debug!("Sent heartbeat");
                }
            }
        }
    }

    /// Queue the balances request and position subscription after their
    /// respective delays, then mark the connection subscribed. Cancelled
    /// with the connection attempt.
    fn spawn_deferred_handshake(&self, token: CancellationToken) {
        let outbound = self.outbound_tx.clone();
        let state = self.state.clone();
        let pending = self.pending.clone();
        let balances_delay = Duration::from_millis(self.config.balances_delay_ms);
        let subscribe_delay = Duration::from_millis(self.config.subscribe_delay_ms);

        tokio::spawn(async move {
            let sequence = async {
                tokio::time::sleep(balances_delay).await;
                let balances = WireRequest::send(pending.next_id(), inner::balances_request());
                if let Ok(text) = serde_json::to_string(&balances) {
                    let _ = outbound.send(text).await;
                }

                tokio::time::sleep(subscribe_delay).await;
                let subscribe = WireRequest::subscribe(inner::position_subscription());
                if let Ok(text) = serde_json::to_string(&subscribe) {
                    if outbound.send(text).await.is_ok() {
                        *state.write() = ConnectionState::Subscribed;
                        info!("Position-update subscription sent");
                    }
                }
            };

            tokio::select! {
                () = sequence => {}
                () = token.cancelled() => {
                    debug!("Deferred handshake cancelled");
                }
            }
        });
    }

    async fn handle_text(&self, text: &str) {
        // One malformed push must never tear down the connection.
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        // Heartbeat echoes carry no information.
        if frame.name == names::HEARTBEAT {
            return;
        }

        // Correlated replies resolve their listener and stop here.
        if self.pending.try_resolve(&frame) {
            return;
        }

        // Everything else is a push for the client dispatcher.
        if self.frame_tx.send(frame).await.is_err() {
            warn!("Frame receiver dropped");
        }
    }
}
