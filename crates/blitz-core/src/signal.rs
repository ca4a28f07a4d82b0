//! Trading signals and direction normalization.
//!
//! Signals arrive from the ingestion endpoint in the upstream alert format
//! (`{ticker, signal, price?, time}`) and are normalized here into the
//! two-valued direction and whole-minute duration the rest of the system
//! works with.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default trade duration in minutes when the signal carries none.
pub const DEFAULT_DURATION_MINUTES: u32 = 5;

/// Trade direction for a binary option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Price will rise ("call" / "buy").
    Call,
    /// Price will fall ("put" / "sell").
    Put,
}

impl Direction {
    /// Parse a direction string from signal or position payloads.
    ///
    /// Accepts both the signal vocabulary ("buy"/"sell") and the brokerage
    /// vocabulary ("call"/"put"), case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "call" | "buy" => Some(Self::Call),
            "put" | "sell" => Some(Self::Put),
            _ => None,
        }
    }

    /// The wire value the brokerage expects in placement requests.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Raw inbound signal as posted by the alerting side.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSignal {
    /// Asset symbol, e.g. "EURUSD".
    pub ticker: String,
    /// Direction keyword, e.g. "buy" or "sell".
    pub signal: String,
    /// Optional reference price (logging only).
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Duration in seconds (e.g. 300 = 5 minutes).
    #[serde(default)]
    pub time: i64,
}

impl RawSignal {
    /// Normalize into a [`Signal`].
    ///
    /// "buy" maps to [`Direction::Call`], anything else to [`Direction::Put`].
    /// Duration converts from seconds to whole minutes, defaulting to
    /// [`DEFAULT_DURATION_MINUTES`] when non-positive.
    pub fn normalize(&self) -> Signal {
        let direction = if self.signal.eq_ignore_ascii_case("buy") {
            Direction::Call
        } else {
            Direction::Put
        };

        let minutes = self.time / 60;
        let duration_minutes = if minutes > 0 {
            minutes as u32
        } else {
            DEFAULT_DURATION_MINUTES
        };

        Signal {
            id: format!("SIG-{}", Uuid::new_v4().simple()),
            asset: self.ticker.clone(),
            direction,
            duration_minutes,
        }
    }
}

/// A normalized trading signal, ready for fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Correlation id for tracking this signal across users.
    pub id: String,
    /// Asset symbol.
    pub asset: String,
    /// Direction.
    pub direction: Direction,
    /// Duration in whole minutes.
    pub duration_minutes: u32,
}

impl Signal {
    /// Build a signal directly (used by the copy trader, which derives
    /// signals from observed trade opens rather than the HTTP endpoint).
    pub fn new(asset: impl Into<String>, direction: Direction, duration_minutes: u32) -> Self {
        Self {
            id: format!("SIG-{}", Uuid::new_v4().simple()),
            asset: asset.into(),
            direction,
            duration_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("buy"), Some(Direction::Call));
        assert_eq!(Direction::parse("CALL"), Some(Direction::Call));
        assert_eq!(Direction::parse("sell"), Some(Direction::Put));
        assert_eq!(Direction::parse("Put"), Some(Direction::Put));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_normalize_buy_signal() {
        let raw = RawSignal {
            ticker: "EURUSD".to_string(),
            signal: "buy".to_string(),
            price: None,
            time: 300,
        };

        let signal = raw.normalize();
        assert_eq!(signal.asset, "EURUSD");
        assert_eq!(signal.direction, Direction::Call);
        assert_eq!(signal.duration_minutes, 5);
    }

    #[test]
    fn test_normalize_sell_signal() {
        let raw = RawSignal {
            ticker: "GBPUSD".to_string(),
            signal: "SELL".to_string(),
            price: None,
            time: 60,
        };

        let signal = raw.normalize();
        assert_eq!(signal.direction, Direction::Put);
        assert_eq!(signal.duration_minutes, 1);
    }

    #[test]
    fn test_normalize_defaults_duration() {
        // Zero, negative and sub-minute durations all fall back to 5 minutes
        for time in [0, -10, 30] {
            let raw = RawSignal {
                ticker: "EURUSD".to_string(),
                signal: "buy".to_string(),
                price: None,
                time,
            };
            assert_eq!(raw.normalize().duration_minutes, 5, "time={time}");
        }
    }

    #[test]
    fn test_normalize_unknown_direction_is_put() {
        let raw = RawSignal {
            ticker: "EURUSD".to_string(),
            signal: "short".to_string(),
            price: None,
            time: 300,
        };
        assert_eq!(raw.normalize().direction, Direction::Put);
    }

    #[test]
    fn test_signal_ids_unique() {
        let a = Signal::new("EURUSD", Direction::Call, 5);
        let b = Signal::new("EURUSD", Direction::Call, 5);
        assert_ne!(a.id, b.id);
    }
}
