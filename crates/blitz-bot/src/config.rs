//! Application configuration.

use crate::error::AppResult;
use blitz_api::ApiConfig;
use blitz_broker::{AccountMode, BrokerConfig, ConnectionConfig, ReconnectPolicy};
use blitz_core::UserId;
use blitz_dispatch::DispatchConfig;
use blitz_engine::LadderPreset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Brokerage WebSocket URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Brokerage identity endpoint URL.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub ladder: LadderSettings,
    /// Lead user whose trade opens are mirrored to followers.
    #[serde(default)]
    pub lead_user: Option<UserId>,
    /// Accounts to connect at startup.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Channels for trade-result announcements.
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_ws_url() -> String {
    "wss://ws.trade.example.com/echo/websocket".to_string()
}

fn default_auth_url() -> String {
    "https://auth.trade.example.com/api/v1.0/login".to_string()
}

/// Signal-ingestion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_bind")]
    pub bind: String,
    /// Shared secret; the `SIGNAL_SECRET` environment variable wins when set.
    #[serde(default)]
    pub secret: String,
}

fn default_api_bind() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_api_bind(),
            secret: String::new(),
        }
    }
}

impl ApiSettings {
    /// The effective secret: environment overrides the file.
    pub fn resolved_secret(&self) -> String {
        std::env::var("SIGNAL_SECRET").unwrap_or_else(|_| self.secret.clone())
    }
}

/// Fan-out pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Pause between users during signal fan-out.
    #[serde(default = "default_user_pacing_ms")]
    pub user_pacing_ms: u64,
    /// Pause between followers during copy fan-out.
    #[serde(default = "default_copy_pacing_ms")]
    pub copy_pacing_ms: u64,
}

fn default_user_pacing_ms() -> u64 {
    800
}

fn default_copy_pacing_ms() -> u64 {
    500
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            user_pacing_ms: default_user_pacing_ms(),
            copy_pacing_ms: default_copy_pacing_ms(),
        }
    }
}

/// Broker connection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_balances_delay_ms")]
    pub balances_delay_ms: u64,
    #[serde(default = "default_subscribe_delay_ms")]
    pub subscribe_delay_ms: u64,
    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// 0 = retry forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_place_deadline_ms")]
    pub place_deadline_ms: u64,
    #[serde(default = "default_candles_deadline_ms")]
    pub candles_deadline_ms: u64,
    #[serde(default = "default_balance_retry_delay_ms")]
    pub balance_retry_delay_ms: u64,
    /// Extra settlement wait beyond the trade duration.
    #[serde(default = "default_settle_grace_ms")]
    pub settle_grace_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_balances_delay_ms() -> u64 {
    1000
}

fn default_subscribe_delay_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_place_deadline_ms() -> u64 {
    10_000
}

fn default_candles_deadline_ms() -> u64 {
    5000
}

fn default_balance_retry_delay_ms() -> u64 {
    2000
}

fn default_settle_grace_ms() -> u64 {
    30_000
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            balances_delay_ms: default_balances_delay_ms(),
            subscribe_delay_ms: default_subscribe_delay_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: 0,
            place_deadline_ms: default_place_deadline_ms(),
            candles_deadline_ms: default_candles_deadline_ms(),
            balance_retry_delay_ms: default_balance_retry_delay_ms(),
            settle_grace_ms: default_settle_grace_ms(),
        }
    }
}

/// Money-management ladder settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LadderSettings {
    #[serde(default)]
    pub preset: LadderPreset,
}

/// One brokerage account to connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub user_id: UserId,
    pub email: String,
    /// Environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Trade against the practice balance instead of the real one.
    #[serde(default)]
    pub practice: bool,
}

fn default_password_env() -> String {
    "BROKER_PASSWORD".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file, with `BLITZ__`-prefixed
    /// environment variables layered on top.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path))
            .add_source(config::Environment::with_prefix("BLITZ").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Broker configuration for one account.
    pub fn broker_config(&self, account: &AccountConfig) -> BrokerConfig {
        BrokerConfig {
            auth_url: self.auth_url.clone(),
            connection: ConnectionConfig {
                ws_url: self.ws_url.clone(),
                heartbeat_interval_ms: self.connection.heartbeat_interval_ms,
                balances_delay_ms: self.connection.balances_delay_ms,
                subscribe_delay_ms: self.connection.subscribe_delay_ms,
                reconnect: ReconnectPolicy {
                    delay_ms: self.connection.reconnect_delay_ms,
                    max_attempts: self.connection.max_reconnect_attempts,
                },
            },
            mode: if account.practice {
                AccountMode::Practice
            } else {
                AccountMode::Real
            },
            place_deadline_ms: self.connection.place_deadline_ms,
            candles_deadline_ms: self.connection.candles_deadline_ms,
            balance_retry_delay_ms: self.connection.balance_retry_delay_ms,
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            bind: self.api.bind.clone(),
            secret: self.api.resolved_secret(),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            user_pacing: Duration::from_millis(self.dispatch.user_pacing_ms),
        }
    }

    pub fn copy_pacing(&self) -> Duration {
        Duration::from_millis(self.dispatch.copy_pacing_ms)
    }

    pub fn settle_grace(&self) -> Duration {
        Duration::from_millis(self.connection.settle_grace_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            auth_url: default_auth_url(),
            api: ApiSettings::default(),
            dispatch: DispatchSettings::default(),
            connection: ConnectionSettings::default(),
            ladder: LadderSettings::default(),
            lead_user: None,
            accounts: Vec::new(),
            channels: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.dispatch.user_pacing_ms, 800);
        assert_eq!(config.dispatch.copy_pacing_ms, 500);
        assert_eq!(config.connection.heartbeat_interval_ms, 30_000);
        assert_eq!(config.connection.reconnect_delay_ms, 5000);
        assert_eq!(config.connection.max_reconnect_attempts, 0);
        assert_eq!(config.connection.settle_grace_ms, 30_000);
        assert_eq!(config.ladder.preset, LadderPreset::SixRung);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let parsed: AppConfig = toml::from_str(
            r#"
            ws_url = "wss://example.test/ws"

            [[accounts]]
            user_id = 42
            email = "lead@example.com"
            password_env = "LEAD_PASSWORD"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.ws_url, "wss://example.test/ws");
        assert_eq!(parsed.accounts.len(), 1);
        assert_eq!(parsed.accounts[0].user_id, 42);
        assert!(!parsed.accounts[0].practice);
        // Everything else falls back to defaults
        assert_eq!(parsed.dispatch.user_pacing_ms, 800);
    }

    #[test]
    fn test_broker_config_mapping() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [connection]
            reconnect_delay_ms = 1234
            max_reconnect_attempts = 7

            [[accounts]]
            user_id = 1
            email = "a@b.c"
            practice = true
            "#,
        )
        .unwrap();

        let broker = parsed.broker_config(&parsed.accounts[0]);
        assert_eq!(broker.connection.reconnect.delay_ms, 1234);
        assert_eq!(broker.connection.reconnect.max_attempts, 7);
        assert_eq!(broker.mode, AccountMode::Practice);
    }

    #[test]
    fn test_ladder_preset_parsing() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [ladder]
            preset = "front_loaded"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.ladder.preset, LadderPreset::FrontLoaded);
    }
}
