//! Wire message types.
//!
//! The brokerage speaks JSON frames of the shape
//! `{"name": ..., "request_id"?: ..., "msg": ...}` in both directions.
//! Requests ride in `sendMessage`/`subscribeMessage` envelopes; replies and
//! pushes share the `name` discriminant.

use blitz_core::Candle;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame names.
pub mod names {
    pub const PROFILE: &str = "profile";
    pub const BALANCES: &str = "balances";
    pub const BALANCE_CHANGED: &str = "balance-changed";
    pub const POSITION: &str = "position";
    pub const POSITION_CHANGED: &str = "position-changed";
    pub const OPTION_OPENED: &str = "option-opened";
    pub const OPTION: &str = "option";
    pub const CANDLES: &str = "candles";
    pub const HEARTBEAT: &str = "heartbeat";
}

// ============================================================================
// Outbound
// ============================================================================

/// Outbound request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    pub msg: Value,
}

impl WireRequest {
    /// Correlated request: `sendMessage` envelope carrying an inner message.
    pub fn send(request_id: u64, inner: Value) -> Self {
        Self {
            name: "sendMessage".to_string(),
            request_id: Some(request_id),
            msg: inner,
        }
    }

    /// Push-stream subscription: `subscribeMessage` envelope.
    pub fn subscribe(inner: Value) -> Self {
        Self {
            name: "subscribeMessage".to_string(),
            request_id: None,
            msg: inner,
        }
    }

    /// Identity frame sent immediately after the socket opens.
    pub fn identity(token: &str) -> Self {
        Self {
            name: "ssid".to_string(),
            request_id: None,
            msg: Value::String(token.to_string()),
        }
    }

    /// Keep-alive frame.
    pub fn heartbeat(now_ms: i64) -> Self {
        Self {
            name: "heartbeat".to_string(),
            request_id: None,
            msg: Value::from(now_ms),
        }
    }
}

/// Inner message builders for the `sendMessage` envelope.
pub mod inner {
    use super::*;

    pub fn profile_request() -> Value {
        serde_json::json!({ "name": "get-profile", "version": "1.0" })
    }

    pub fn balances_request() -> Value {
        serde_json::json!({ "name": "get-balances", "version": "1.0" })
    }

    /// Blitz option placement.
    pub fn open_option(
        active_id: u32,
        direction: &str,
        amount: Decimal,
        balance_selector: u64,
        expired_at_secs: i64,
        duration_secs: u32,
    ) -> Value {
        serde_json::json!({
            "name": "binary-options.open-option",
            "version": "1.0",
            "body": {
                "active_id": active_id,
                "option_type_id": 12,
                "option_type": "blitz",
                "direction": direction,
                "expired": expired_at_secs,
                "price": amount,
                "user_balance_id": balance_selector,
                "expiration_size": duration_secs,
            }
        })
    }

    pub fn candles_request(active_id: u32, interval_secs: u32, count: u32, end_secs: i64) -> Value {
        let span = i64::from(count) * i64::from(interval_secs);
        serde_json::json!({
            "name": "get-candles",
            "version": "2.0",
            "body": {
                "active_id": active_id,
                "size": interval_secs,
                "from": end_secs - span,
                "to": end_secs,
                "count": count,
            }
        })
    }

    /// Subscription payload for the position-update stream.
    pub fn position_subscription() -> Value {
        serde_json::json!({
            "name": "position-changed",
            "version": "2.0",
            "params": {}
        })
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Request id echoed by the brokerage.
///
/// Observed as a JSON number in most replies, but some gateway versions echo
/// it back as a string; accept both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(u64),
    Str(String),
}

impl RequestId {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
        }
    }
}

/// One inbound frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default)]
    pub msg: Value,
}

impl Frame {
    pub fn request_id_u64(&self) -> Option<u64> {
        self.request_id.as_ref().and_then(RequestId::as_u64)
    }

    pub fn as_profile(&self) -> Option<ProfileMsg> {
        (self.name == names::PROFILE)
            .then(|| serde_json::from_value(self.msg.clone()).ok())
            .flatten()
    }

    pub fn as_balances(&self) -> Option<Vec<BalanceEntry>> {
        (self.name == names::BALANCES)
            .then(|| serde_json::from_value(self.msg.clone()).ok())
            .flatten()
    }

    pub fn as_position(&self) -> Option<PositionMsg> {
        (self.name == names::POSITION || self.name == names::POSITION_CHANGED)
            .then(|| serde_json::from_value(self.msg.clone()).ok())
            .flatten()
    }

    pub fn as_option_opened(&self) -> Option<u64> {
        if self.name != names::OPTION_OPENED {
            return None;
        }
        self.msg.get("option_id").and_then(Value::as_u64)
    }

    /// Rejection text from an `option` reply, when present.
    pub fn as_option_rejection(&self) -> Option<String> {
        if self.name != names::OPTION {
            return None;
        }
        self.msg
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Candle bars from a `candles` reply.
    ///
    /// The gateway wraps the bars in `{"candles": [...]}`; older responses
    /// carried the bare array. Unparseable bars are skipped.
    pub fn as_candles(&self) -> Vec<Candle> {
        if self.name != names::CANDLES {
            return Vec::new();
        }
        let bars = match &self.msg {
            Value::Array(arr) => arr.as_slice(),
            Value::Object(obj) => match obj.get("candles") {
                Some(Value::Array(arr)) => arr.as_slice(),
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        bars.iter()
            .filter_map(|bar| serde_json::from_value(bar.clone()).ok())
            .collect()
    }
}

/// One balance entry from `profile`/`balances` payloads.
///
/// The `type` discriminant selects the account mode: 1 = real, 4 = practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: u8,
    pub amount: Decimal,
    pub currency: String,
}

impl BalanceEntry {
    pub const REAL: u8 = 1;
    pub const PRACTICE: u8 = 4;

    pub fn is_real(&self) -> bool {
        self.kind == Self::REAL
    }

    pub fn is_practice(&self) -> bool {
        self.kind == Self::PRACTICE
    }
}

/// `profile` push payload (only the balances section is interpreted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMsg {
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
}

/// Nested raw event inside a position payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub profit_amount: Option<Decimal>,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub open_time: Option<i64>,
    #[serde(default)]
    pub open_time_millisecond: Option<i64>,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub expiration_value: Option<Decimal>,
}

/// `position`/`position-changed` push payload.
///
/// Field presence varies between gateway versions; every accessor below
/// prefers the top-level field and falls back to the raw event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionMsg {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub external_id: Option<u64>,
    #[serde(default)]
    pub active_id: Option<u32>,
    #[serde(default)]
    pub instrument_id: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub invest: Option<Decimal>,
    #[serde(default)]
    pub close_reason: Option<String>,
    #[serde(default)]
    pub close_profit: Option<Decimal>,
    #[serde(default)]
    pub open_time: Option<i64>,
    #[serde(default)]
    pub close_time: Option<i64>,
    #[serde(default)]
    pub open_quote: Option<Decimal>,
    #[serde(default)]
    pub close_quote: Option<Decimal>,
    #[serde(default)]
    pub raw_event: Option<RawEvent>,
}

impl PositionMsg {
    pub fn is_open(&self) -> bool {
        self.status.as_deref() == Some("open")
    }

    pub fn is_closed(&self) -> bool {
        self.status.as_deref() == Some("closed")
    }

    pub fn trade_id(&self) -> Option<u64> {
        self.id.or(self.external_id)
    }

    pub fn instrument(&self) -> Option<u32> {
        self.active_id.or(self.instrument_id)
    }

    pub fn direction_str(&self) -> Option<&str> {
        self.raw_event
            .as_ref()
            .and_then(|e| e.direction.as_deref())
            .or(self.direction.as_deref())
    }

    pub fn stake(&self) -> Decimal {
        self.invest
            .or_else(|| self.raw_event.as_ref().and_then(|e| e.amount))
            .unwrap_or(Decimal::ZERO)
    }

    /// Win is signaled by an explicit result or close-reason field.
    pub fn is_win(&self) -> bool {
        self.raw_event
            .as_ref()
            .and_then(|e| e.result.as_deref())
            .map(|r| r == "win")
            .unwrap_or(false)
            || self.close_reason.as_deref() == Some("win")
    }

    pub fn payout(&self) -> Option<Decimal> {
        self.close_profit
            .or_else(|| self.raw_event.as_ref().and_then(|e| e.profit_amount))
    }

    pub fn opened_at_ms(&self) -> Option<i64> {
        self.open_time
            .or_else(|| self.raw_event.as_ref().and_then(|e| e.open_time_millisecond))
    }

    /// Duration in whole minutes, derivable when the raw event carries both
    /// open and expiration times (seconds).
    pub fn duration_minutes(&self) -> Option<u32> {
        let raw = self.raw_event.as_ref()?;
        let (open, exp) = (raw.open_time?, raw.expiration_time?);
        let secs = exp.checked_sub(open)?;
        if secs <= 0 {
            return None;
        }
        // Round to the nearest minute
        Some(((secs + 30) / 60) as u32)
    }

    pub fn entry_price(&self) -> Option<Decimal> {
        self.open_quote
            .or_else(|| self.raw_event.as_ref().and_then(|e| e.value))
    }

    pub fn exit_price(&self) -> Option<Decimal> {
        self.close_quote
            .or_else(|| self.raw_event.as_ref().and_then(|e| e.expiration_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    // ========================================================================
    // Outbound serialization
    // ========================================================================

    #[test]
    fn test_send_envelope_serialization() {
        let req = WireRequest::send(7, inner::profile_request());
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["name"], "sendMessage");
        assert_eq!(v["request_id"], 7);
        assert_eq!(v["msg"]["name"], "get-profile");
        assert_eq!(v["msg"]["version"], "1.0");
    }

    #[test]
    fn test_subscribe_envelope_omits_request_id() {
        let req = WireRequest::subscribe(inner::position_subscription());
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["name"], "subscribeMessage");
        assert!(!v.as_object().unwrap().contains_key("request_id"));
        assert_eq!(v["msg"]["name"], "position-changed");
        assert_eq!(v["msg"]["version"], "2.0");
    }

    #[test]
    fn test_identity_frame() {
        let req = WireRequest::identity("tok-1");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["name"], "ssid");
        assert_eq!(v["msg"], "tok-1");
    }

    #[test]
    fn test_open_option_body() {
        let msg = inner::open_option(1861, "call", dec!(1500), 42, 1_700_000_300, 300);
        assert_eq!(msg["name"], "binary-options.open-option");
        let body = &msg["body"];
        assert_eq!(body["active_id"], 1861);
        assert_eq!(body["option_type_id"], 12);
        assert_eq!(body["option_type"], "blitz");
        assert_eq!(body["direction"], "call");
        assert_eq!(body["expired"], 1_700_000_300);
        assert_eq!(body["user_balance_id"], 42);
        assert_eq!(body["expiration_size"], 300);
    }

    #[test]
    fn test_candles_request_window() {
        let msg = inner::candles_request(1861, 30, 10, 1_700_000_000);
        let body = &msg["body"];
        assert_eq!(body["size"], 30);
        assert_eq!(body["count"], 10);
        assert_eq!(body["from"], 1_700_000_000 - 300);
        assert_eq!(body["to"], 1_700_000_000);
    }

    // ========================================================================
    // Inbound parsing
    // ========================================================================

    #[test]
    fn test_frame_request_id_number_and_string() {
        let f: Frame = serde_json::from_value(json!({"name": "candles", "request_id": 5, "msg": []}))
            .unwrap();
        assert_eq!(f.request_id_u64(), Some(5));

        let f: Frame =
            serde_json::from_value(json!({"name": "candles", "request_id": "5", "msg": []}))
                .unwrap();
        assert_eq!(f.request_id_u64(), Some(5));

        let f: Frame = serde_json::from_value(json!({"name": "heartbeat"})).unwrap();
        assert_eq!(f.request_id_u64(), None);
    }

    #[test]
    fn test_profile_balances_parsing() {
        let f: Frame = serde_json::from_value(json!({
            "name": "profile",
            "msg": {
                "user_id": 99,
                "balances": [
                    {"id": 11, "type": 1, "amount": 5000.5, "currency": "NGN"},
                    {"id": 12, "type": 4, "amount": 10000, "currency": "USD"}
                ]
            }
        }))
        .unwrap();

        let profile = f.as_profile().unwrap();
        assert_eq!(profile.balances.len(), 2);
        assert!(profile.balances[0].is_real());
        assert_eq!(profile.balances[0].amount, dec!(5000.5));
        assert!(profile.balances[1].is_practice());
        assert_eq!(profile.balances[1].currency, "USD");
    }

    #[test]
    fn test_balances_parsing() {
        let f: Frame = serde_json::from_value(json!({
            "name": "balances",
            "msg": [
                {"id": 11, "type": 1, "amount": 200, "currency": "USD"}
            ]
        }))
        .unwrap();

        let balances = f.as_balances().unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].id, 11);
    }

    #[test]
    fn test_option_opened_parsing() {
        let f: Frame = serde_json::from_value(json!({
            "name": "option-opened",
            "msg": {"option_id": 987654, "active_id": 1861}
        }))
        .unwrap();
        assert_eq!(f.as_option_opened(), Some(987654));
        assert!(f.as_option_rejection().is_none());
    }

    #[test]
    fn test_option_rejection_parsing() {
        let f: Frame = serde_json::from_value(json!({
            "name": "option",
            "request_id": 3,
            "msg": {"message": "Not enough money"}
        }))
        .unwrap();
        assert_eq!(f.as_option_rejection().as_deref(), Some("Not enough money"));
        assert!(f.as_option_opened().is_none());
    }

    #[test]
    fn test_position_open_parsing() {
        let f: Frame = serde_json::from_value(json!({
            "name": "position-changed",
            "msg": {
                "id": 555,
                "active_id": 1861,
                "status": "open",
                "invest": 1500,
                "open_time": 1_700_000_000_000_i64,
                "raw_event": {
                    "direction": "call",
                    "open_time": 1_700_000_000_i64,
                    "expiration_time": 1_700_000_300_i64
                }
            }
        }))
        .unwrap();

        let pos = f.as_position().unwrap();
        assert!(pos.is_open());
        assert_eq!(pos.trade_id(), Some(555));
        assert_eq!(pos.instrument(), Some(1861));
        assert_eq!(pos.direction_str(), Some("call"));
        assert_eq!(pos.stake(), dec!(1500));
        assert_eq!(pos.duration_minutes(), Some(5));
    }

    #[test]
    fn test_position_closed_win_parsing() {
        let f: Frame = serde_json::from_value(json!({
            "name": "position-changed",
            "msg": {
                "external_id": 556,
                "instrument_id": 76,
                "status": "closed",
                "invest": 1500,
                "close_profit": 2850,
                "close_reason": "win",
                "open_quote": 1.0712,
                "close_quote": 1.0734,
                "close_time": 1_700_000_300_000_i64
            }
        }))
        .unwrap();

        let pos = f.as_position().unwrap();
        assert!(pos.is_closed());
        assert!(pos.is_win());
        assert_eq!(pos.trade_id(), Some(556));
        assert_eq!(pos.payout(), Some(dec!(2850)));
        assert_eq!(pos.entry_price(), Some(dec!(1.0712)));
        assert_eq!(pos.exit_price(), Some(dec!(1.0734)));
    }

    #[test]
    fn test_position_closed_loss_via_raw_event() {
        let f: Frame = serde_json::from_value(json!({
            "name": "position",
            "msg": {
                "id": 557,
                "status": "closed",
                "raw_event": {
                    "amount": 3000,
                    "result": "loose",
                    "profit_amount": 0
                }
            }
        }))
        .unwrap();

        let pos = f.as_position().unwrap();
        assert!(pos.is_closed());
        assert!(!pos.is_win());
        assert_eq!(pos.stake(), dec!(3000));
    }

    #[test]
    fn test_candles_wrapped_and_bare() {
        let wrapped: Frame = serde_json::from_value(json!({
            "name": "candles",
            "request_id": 9,
            "msg": {"candles": [
                {"from": 100, "to": 130, "open": 1.1, "close": 1.2, "min": 1.05, "max": 1.25}
            ]}
        }))
        .unwrap();
        assert_eq!(wrapped.as_candles().len(), 1);

        let bare: Frame = serde_json::from_value(json!({
            "name": "candles",
            "request_id": 9,
            "msg": [
                {"from": 100, "to": 130, "open": 1.1, "close": 1.2, "min": 1.05, "max": 1.25},
                {"from": 130, "to": 160, "open": 1.2, "close": 1.15, "min": 1.1, "max": 1.22}
            ]
        }))
        .unwrap();
        let candles = bare.as_candles();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, dec!(1.15));
    }

    #[test]
    fn test_candles_skips_malformed_bars() {
        let f: Frame = serde_json::from_value(json!({
            "name": "candles",
            "msg": [
                {"from": 100, "to": 130, "open": 1.1, "close": 1.2, "min": 1.05, "max": 1.25},
                {"garbage": true}
            ]
        }))
        .unwrap();
        assert_eq!(f.as_candles().len(), 1);
    }

    #[test]
    fn test_wrong_name_accessors_return_none() {
        let f: Frame =
            serde_json::from_value(json!({"name": "profile", "msg": {"balances": []}})).unwrap();
        assert!(f.as_position().is_none());
        assert!(f.as_option_opened().is_none());
        assert!(f.as_candles().is_empty());
    }
}
