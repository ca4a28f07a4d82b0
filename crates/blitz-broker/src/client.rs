//! Broker client facade.
//!
//! One `BrokerClient` per user: owns the supervised connection, the live
//! balance snapshot for both account modes, and the event stream observers
//! subscribe to. All asynchronous operations are built on the correlated
//! request primitive in [`crate::pending`].

use crate::auth::{AuthClient, Credentials, SessionToken};
use crate::connection::{Connection, ConnectionConfig, ConnectionState};
use crate::error::{BrokerError, BrokerResult};
use crate::message::{inner, names, BalanceEntry, Frame, PositionMsg, WireRequest};
use crate::pending::PendingRequests;
use blitz_core::{AssetDirectory, Candle, Direction, TradeClose, TradeOpen, UserId};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex};
use tracing::{debug, info, warn};

/// Which sub-account placements draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    #[default]
    Real,
    Practice,
}

/// Live balance for one sub-account.
#[derive(Debug, Clone, Default)]
pub struct BalanceSlot {
    pub amount: Decimal,
    pub currency: String,
    /// Opaque balance-selector id required by placement requests.
    pub selector: Option<u64>,
}

/// Balance snapshot for both account modes.
///
/// Eventually consistent with the brokerage; refreshed by `profile` and
/// `balances` pushes.
#[derive(Debug, Clone, Default)]
pub struct AccountBalances {
    pub real: BalanceSlot,
    pub practice: BalanceSlot,
    pub mode: AccountMode,
}

impl AccountBalances {
    /// The slot the active account mode draws from.
    pub fn active(&self) -> &BalanceSlot {
        match self.mode {
            AccountMode::Real => &self.real,
            AccountMode::Practice => &self.practice,
        }
    }

    /// Fold balance entries from a `profile`/`balances` payload into the
    /// snapshot, keyed by the entry's `type` discriminant.
    pub fn apply_entries(&mut self, entries: &[BalanceEntry]) {
        for entry in entries {
            let slot = if entry.is_real() {
                &mut self.real
            } else if entry.is_practice() {
                &mut self.practice
            } else {
                continue;
            };
            slot.amount = entry.amount;
            slot.currency = entry.currency.clone();
            slot.selector = Some(entry.id);
        }
    }
}

/// Events observers receive from a client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    TradeOpened(TradeOpen),
    TradeClosed(TradeClose),
    BalanceChanged(AccountBalances),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Identity endpoint URL.
    pub auth_url: String,
    /// Socket configuration.
    pub connection: ConnectionConfig,
    /// Account mode placements draw from.
    pub mode: AccountMode,
    /// Placement reply deadline.
    pub place_deadline_ms: u64,
    /// Candle reply deadline.
    pub candles_deadline_ms: u64,
    /// Wait before the single balance-selector retry.
    pub balance_retry_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            auth_url: String::new(),
            connection: ConnectionConfig::default(),
            mode: AccountMode::Real,
            place_deadline_ms: 10_000,
            candles_deadline_ms: 5_000,
            balance_retry_delay_ms: 2_000,
        }
    }
}

/// One user's brokerage client.
pub struct BrokerClient {
    user_id: UserId,
    config: BrokerConfig,
    assets: Arc<AssetDirectory>,
    auth: AuthClient,
    token: RwLock<Option<SessionToken>>,
    connection: Connection,
    pending: Arc<PendingRequests>,
    outbound: mpsc::Sender<String>,
    frame_rx: TokioMutex<mpsc::Receiver<Frame>>,
    balances: RwLock<AccountBalances>,
    events_tx: broadcast::Sender<ClientEvent>,
}

impl BrokerClient {
    pub fn new(
        user_id: UserId,
        config: BrokerConfig,
        assets: Arc<AssetDirectory>,
    ) -> BrokerResult<Self> {
        let auth = AuthClient::new(config.auth_url.clone())?;
        let pending = Arc::new(PendingRequests::new());
        let (frame_tx, frame_rx) = mpsc::channel(256);
        let connection = Connection::new(config.connection.clone(), pending.clone(), frame_tx);
        let outbound = connection.writer();
        let (events_tx, _) = broadcast::channel(64);

        let balances = AccountBalances {
            mode: config.mode,
            ..Default::default()
        };

        Ok(Self {
            user_id,
            config,
            assets,
            auth,
            token: RwLock::new(None),
            connection,
            pending,
            outbound,
            frame_rx: TokioMutex::new(frame_rx),
            balances: RwLock::new(balances),
            events_tx,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Exchange credentials for a session token. Never retried here; a
    /// failed login leaves the client disconnected and is the caller's to
    /// surface.
    pub async fn authenticate(&self, credentials: &Credentials) -> BrokerResult<()> {
        let token = self.auth.login(credentials).await?;
        *self.token.write() = Some(token);
        Ok(())
    }

    /// Adopt an existing session token (e.g. one persisted from a previous
    /// login) instead of performing the credential exchange.
    pub fn resume_session(&self, token: SessionToken) {
        *self.token.write() = Some(token);
    }

    /// Run the connection and push dispatcher until disconnected.
    ///
    /// Requires a prior successful [`authenticate`](Self::authenticate).
    pub async fn run(&self) -> BrokerResult<()> {
        let token = self
            .token
            .read()
            .clone()
            .ok_or_else(|| BrokerError::Auth("login required before connect".to_string()))?;

        tokio::select! {
            result = self.connection.connect(&token) => result,
            () = self.dispatch_frames() => Ok(()),
        }
    }

    /// Request a graceful disconnect; suppresses reconnection.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Socket is open (handshake at least authenticated).
    pub fn is_connected(&self) -> bool {
        self.connection.is_online()
    }

    /// Subscribe to this client's trade/balance events.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    /// Current balance snapshot (both modes).
    pub fn balances(&self) -> AccountBalances {
        self.balances.read().clone()
    }

    /// Balance of the active account mode.
    pub fn active_balance(&self) -> Decimal {
        self.balances.read().active().amount
    }

    /// Currency of the active account mode (empty until the first profile).
    pub fn active_currency(&self) -> String {
        self.balances.read().active().currency.clone()
    }

    fn active_selector(&self) -> Option<u64> {
        self.balances.read().active().selector
    }

    /// Fire-and-forget profile refresh.
    pub async fn refresh_profile(&self) {
        let request = WireRequest::send(self.pending.next_id(), inner::profile_request());
        if let Ok(text) = serde_json::to_string(&request) {
            if self.outbound.send(text).await.is_err() {
                debug!(user = self.user_id, "Profile refresh dropped: not connected");
            }
        }
    }

    /// Correlated request: send `inner` and await a reply matching one of
    /// `expected` within `deadline`.
    async fn request(
        &self,
        inner: Value,
        expected: &'static [&'static str],
        deadline: Duration,
        label: &'static str,
    ) -> BrokerResult<Frame> {
        let id = self.pending.next_id();
        let rx = self.pending.register(id, expected);

        let request = WireRequest::send(id, inner);
        let text = serde_json::to_string(&request)?;
        if self.outbound.send(text).await.is_err() {
            self.pending.remove(id);
            return Err(BrokerError::NotConnected);
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            // Listener invalidated (connection closed); callers observe the
            // same terminal timeout rather than a connection error.
            Ok(Err(_)) => Err(BrokerError::RequestTimeout(label)),
            Err(_) => {
                self.pending.remove(id);
                Err(BrokerError::RequestTimeout(label))
            }
        }
    }

    /// Place a blitz option.
    ///
    /// Success is signaled only by an explicit `option-opened` reply
    /// carrying the broker trade id; any rejection or timeout is terminal
    /// for this trade and never retried here.
    pub async fn place_trade(
        &self,
        asset: &str,
        direction: Direction,
        amount: Decimal,
        duration_minutes: u32,
    ) -> BrokerResult<u64> {
        let active_id = self.assets.id_for(asset);

        let selector = match self.active_selector() {
            Some(selector) => selector,
            None => {
                // One profile refresh, one retry, then give up.
                warn!(user = self.user_id, "No balance selector yet, refreshing profile");
                self.refresh_profile().await;
                tokio::time::sleep(Duration::from_millis(self.config.balance_retry_delay_ms))
                    .await;
                self.active_selector().ok_or(BrokerError::BalanceNotReady)?
            }
        };

        let duration_secs = duration_minutes * 60;
        let expired_at = chrono::Utc::now().timestamp() + i64::from(duration_secs);

        info!(
            user = self.user_id,
            asset,
            active_id,
            %direction,
            %amount,
            duration_minutes,
            "Placing trade"
        );

        let reply = self
            .request(
                inner::open_option(
                    active_id,
                    direction.as_wire(),
                    amount,
                    selector,
                    expired_at,
                    duration_secs,
                ),
                &[names::OPTION_OPENED, names::OPTION],
                Duration::from_millis(self.config.place_deadline_ms),
                "placement",
            )
            .await?;

        if let Some(trade_id) = reply.as_option_opened() {
            info!(user = self.user_id, trade_id, "Trade opened");
            return Ok(trade_id);
        }

        let reason = reply
            .as_option_rejection()
            .unwrap_or_else(|| "rejected without reason".to_string());
        warn!(user = self.user_id, %reason, "Trade rejected");
        Err(BrokerError::PlacementRejected(reason))
    }

    /// Fetch a finite OHLC sequence ending at `end_secs`.
    pub async fn get_candles(
        &self,
        active_id: u32,
        interval_secs: u32,
        count: u32,
        end_secs: i64,
    ) -> BrokerResult<Vec<Candle>> {
        let reply = self
            .request(
                inner::candles_request(active_id, interval_secs, count, end_secs),
                &[names::CANDLES],
                Duration::from_millis(self.config.candles_deadline_ms),
                "candles",
            )
            .await?;
        Ok(reply.as_candles())
    }

    /// Resolve an asset symbol through the directory (for chart fetches).
    pub fn instrument_id(&self, asset: &str) -> u32 {
        self.assets.id_for(asset)
    }

    // ========================================================================
    // Push dispatch
    // ========================================================================

    async fn dispatch_frames(&self) {
        loop {
            let frame = { self.frame_rx.lock().await.recv().await };
            let Some(frame) = frame else {
                return;
            };
            self.handle_push(frame).await;
        }
    }

    async fn handle_push(&self, frame: Frame) {
        match frame.name.as_str() {
            names::PROFILE => {
                if let Some(profile) = frame.as_profile() {
                    let snapshot = {
                        let mut balances = self.balances.write();
                        balances.apply_entries(&profile.balances);
                        balances.clone()
                    };
                    debug!(
                        user = self.user_id,
                        balance = %snapshot.active().amount,
                        currency = %snapshot.active().currency,
                        "Profile applied"
                    );
                    let _ = self.events_tx.send(ClientEvent::BalanceChanged(snapshot));
                }
            }
            names::BALANCES => {
                if let Some(entries) = frame.as_balances() {
                    self.balances.write().apply_entries(&entries);
                }
            }
            names::POSITION | names::POSITION_CHANGED => {
                if let Some(position) = frame.as_position() {
                    self.handle_position(position).await;
                }
            }
            names::BALANCE_CHANGED => {
                // Amounts arrive via the follow-up profile
                self.refresh_profile().await;
            }
            other => {
                debug!(user = self.user_id, name = other, "Unhandled push frame");
            }
        }
    }

    async fn handle_position(&self, position: PositionMsg) {
        if position.is_open() {
            if let Some(open) = trade_open_from(&position, &self.assets) {
                info!(
                    user = self.user_id,
                    trade_id = open.trade_id,
                    asset = %open.asset,
                    amount = %open.amount,
                    "Position opened"
                );
                let _ = self.events_tx.send(ClientEvent::TradeOpened(open));
            }
        } else if position.is_closed() {
            if let Some(close) = trade_close_from(&position, &self.assets) {
                info!(
                    user = self.user_id,
                    trade_id = close.trade_id,
                    win = close.win,
                    "Position closed"
                );
                let _ = self.events_tx.send(ClientEvent::TradeClosed(close));
                // Settled positions move the balance
                self.refresh_profile().await;
            }
        }
    }
}

/// Interpret an open position push as a trade-open event.
fn trade_open_from(position: &PositionMsg, assets: &AssetDirectory) -> Option<TradeOpen> {
    let trade_id = position.trade_id()?;
    let asset = assets.resolve(position.instrument().unwrap_or(0));
    Some(TradeOpen {
        trade_id,
        asset,
        direction: position.direction_str().and_then(Direction::parse),
        amount: position.stake(),
        duration_minutes: position.duration_minutes(),
        opened_at_ms: position
            .opened_at_ms()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
    })
}

/// Interpret a closed position push as a trade-close event.
fn trade_close_from(position: &PositionMsg, assets: &AssetDirectory) -> Option<TradeClose> {
    let trade_id = position.trade_id()?;
    let asset = assets.resolve(position.instrument().unwrap_or(0));
    Some(TradeClose {
        trade_id,
        asset,
        direction: position.direction_str().and_then(Direction::parse),
        stake: position.stake(),
        win: position.is_win(),
        payout: position.payout(),
        reported_profit: position
            .raw_event
            .as_ref()
            .and_then(|e| e.profit_amount),
        entry_price: position.entry_price(),
        exit_price: position.exit_price(),
        opened_at_ms: position.opened_at_ms(),
        closed_at_ms: position.close_time,
    })
}
