//! Main application orchestration.
//!
//! Wires storage, engine, registry, tracker, dispatcher and the signal API
//! together, connects the configured brokerage accounts, and runs the
//! signal loop until shutdown.

use crate::config::AppConfig;
use crate::error::AppResult;
use blitz_broker::{BrokerClient, ClientEvent, Credentials};
use blitz_core::{
    AssetDirectory, LogNotifier, MemoryUserStore, Notifier, Signal, UserRecord, UserStore,
};
use blitz_dispatch::{ConnectionRegistry, CopyTrader, Dispatcher};
use blitz_engine::MoneyEngine;
use blitz_telemetry::Metrics;
use blitz_trade::TradeExecutor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<ConnectionRegistry>,
    executor: Arc<TradeExecutor>,
    dispatcher: Arc<Dispatcher>,
    assets: Arc<AssetDirectory>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn UserStore> = Arc::new(seed_store(&config));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let engine = Arc::new(MoneyEngine::new(config.ladder.preset.to_config()));
        let registry = Arc::new(ConnectionRegistry::new());
        let assets = Arc::new(AssetDirectory::with_defaults());

        let executor = Arc::new(
            TradeExecutor::new(engine, store.clone(), notifier.clone())
                .with_settle_grace(config.settle_grace()),
        );

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            executor.clone(),
            store.clone(),
            config.dispatch_config(),
        ));

        Ok(Self {
            config,
            store,
            notifier,
            registry,
            executor,
            dispatcher,
            assets,
        })
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        info!(
            accounts = self.config.accounts.len(),
            lead = ?self.config.lead_user,
            "Starting blitz-bot"
        );

        // Signal channel: API producer, dispatcher consumer
        let (signal_tx, mut signal_rx) = mpsc::channel::<Signal>(64);

        let api_config = self.config.api_config();
        if api_config.secret.is_empty() {
            warn!("No signal secret configured; the ingestion endpoint will reject everything");
        }
        tokio::spawn(async move {
            if let Err(e) = blitz_api::serve(api_config, signal_tx).await {
                error!(?e, "Signal API server exited");
            }
        });

        self.connect_accounts().await;

        info!("Entering signal loop");
        loop {
            tokio::select! {
                Some(signal) = signal_rx.recv() => {
                    Metrics::signal_received(&signal.direction.to_string());
                    let summary = self.dispatcher.dispatch(&signal).await;
                    for _ in 0..summary.placed {
                        Metrics::trade_placed("ok");
                    }
                    for _ in 0..summary.failed {
                        Metrics::trade_placed("failed");
                    }
                    info!(
                        signal = %signal.id,
                        placed = summary.placed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Fan-out complete"
                    );
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Graceful disconnect suppresses every reconnect loop
        for client in self.registry.all() {
            client.disconnect();
        }
        info!("Shutdown complete");

        Ok(())
    }

    /// Authenticate and connect every configured account. A failed login is
    /// surfaced and skipped, never retried automatically.
    async fn connect_accounts(&self) {
        for account in &self.config.accounts {
            let password = match std::env::var(&account.password_env) {
                Ok(password) => password,
                Err(_) => {
                    warn!(
                        user = account.user_id,
                        env = %account.password_env,
                        "Password environment variable not set, skipping account"
                    );
                    continue;
                }
            };

            let client = match BrokerClient::new(
                account.user_id,
                self.config.broker_config(account),
                self.assets.clone(),
            ) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    error!(user = account.user_id, ?e, "Failed to build broker client");
                    continue;
                }
            };

            let credentials = Credentials::new(account.email.clone(), password);
            if let Err(e) = client.authenticate(&credentials).await {
                warn!(user = account.user_id, error = %e, "Login failed, skipping account");
                continue;
            }

            self.registry.insert(client.clone());
            self.spawn_client_runner(client.clone());
            self.spawn_event_pump(client.clone());

            if self.config.lead_user == Some(account.user_id) {
                self.spawn_copy_trader(client);
            }
        }

        info!(connected = self.registry.len(), "Accounts connected");
    }

    fn spawn_client_runner(&self, client: Arc<BrokerClient>) {
        tokio::spawn(async move {
            let user = client.user_id();
            if let Err(e) = client.run().await {
                error!(user, ?e, "Broker client exited with error");
            } else {
                info!(user, "Broker client exited");
            }
        });
    }

    /// Forward trade-open events to the notifier and keep the settlement
    /// counters current. (Close notifications come from the settlement
    /// watcher, which knows the realized profit.)
    fn spawn_event_pump(&self, client: Arc<BrokerClient>) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let user = client.user_id();
            let mut events = client.events();
            loop {
                match events.recv().await {
                    Ok(ClientEvent::TradeOpened(open)) => {
                        notifier.trade_opened(user, &open);
                    }
                    Ok(ClientEvent::TradeClosed(close)) => {
                        Metrics::trade_settled(if close.win { "WIN" } else { "LOSS" });
                    }
                    Ok(ClientEvent::BalanceChanged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    fn spawn_copy_trader(&self, client: Arc<BrokerClient>) {
        let copy_trader = CopyTrader::new(
            client.user_id(),
            self.registry.clone(),
            self.executor.clone(),
            self.store.clone(),
            self.config.copy_pacing(),
        );
        let events = client.events();
        tokio::spawn(async move {
            copy_trader.run(events).await;
        });
    }
}

/// Seed the in-memory store with a record per configured account.
fn seed_store(config: &AppConfig) -> MemoryUserStore {
    let store = MemoryUserStore::with_channels(config.channels.clone());
    for account in &config.accounts {
        store.insert(UserRecord::new(account.user_id, account.email.clone()));
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;

    #[test]
    fn test_seed_store_creates_account_records() {
        let mut config = AppConfig::default();
        config.accounts.push(AccountConfig {
            user_id: 42,
            email: "lead@example.com".to_string(),
            password_env: "X".to_string(),
            practice: false,
        });
        config.channels.push("announcements".to_string());

        let store = seed_store(&config);
        let user = store.get_user(42).unwrap();
        assert_eq!(user.email, "lead@example.com");
        assert!(user.auto_trading_enabled);
        assert_eq!(store.active_channels(), vec!["announcements".to_string()]);
    }

    #[tokio::test]
    async fn test_application_builds_from_defaults() {
        let app = Application::new(AppConfig::default()).unwrap();
        assert!(app.registry.is_empty());
    }
}
