//! Identity-endpoint authentication.
//!
//! A synchronous-style exchange with the brokerage's HTTP login endpoint.
//! On success the session token is kept for the socket handshake; on
//! failure the caller surfaces the error — a failed login is never retried
//! automatically.

use crate::error::{BrokerError, BrokerResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Login credentials. The password is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    #[zeroize(skip)]
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session token returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    ssid: String,
}

#[derive(Debug, Deserialize)]
struct LoginError {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the brokerage identity endpoint.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    login_url: String,
}

impl AuthClient {
    pub fn new(login_url: impl Into<String>) -> BrokerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            login_url: login_url.into(),
        })
    }

    /// Exchange credentials for a session token.
    pub async fn login(&self, credentials: &Credentials) -> BrokerResult<SessionToken> {
        info!(email = %credentials.email, "Logging in to brokerage");

        let response = self
            .http
            .post(&self.login_url)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password(),
            }))
            .send()
            .await
            .map_err(|e| BrokerError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<LoginError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!(email = %credentials.email, %message, "Login rejected");
            return Err(BrokerError::Auth(message));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Auth(format!("malformed login response: {e}")))?;

        info!(email = %credentials.email, "Login successful");
        Ok(SessionToken::new(body.data.ssid))
    }
}
