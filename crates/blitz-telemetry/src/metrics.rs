//! Prometheus counters for the trading pipeline.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

static SIGNALS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blitz_signals_received_total",
        "Signals received from the ingestion endpoint",
        &["direction"]
    )
    .expect("metric registration")
});

static TRADES_PLACED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blitz_trades_placed_total",
        "Placement attempts by result",
        &["result"]
    )
    .expect("metric registration")
});

static TRADES_SETTLED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blitz_trades_settled_total",
        "Settlements by outcome",
        &["outcome"]
    )
    .expect("metric registration")
});

static RECONNECTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blitz_reconnects_total",
        "Broker socket reconnect attempts per user",
        &["user"]
    )
    .expect("metric registration")
});

/// Static facade over the pipeline counters.
pub struct Metrics;

impl Metrics {
    pub fn signal_received(direction: &str) {
        SIGNALS_RECEIVED.with_label_values(&[direction]).inc();
    }

    pub fn trade_placed(result: &str) {
        TRADES_PLACED.with_label_values(&[result]).inc();
    }

    pub fn trade_settled(outcome: &str) {
        TRADES_SETTLED.with_label_values(&[outcome]).inc();
    }

    pub fn reconnect(user: &str) {
        RECONNECTS.with_label_values(&[user]).inc();
    }

    /// Gather all registered metrics in the text exposition format.
    pub fn gather() -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder
            .encode(&prometheus::gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        Metrics::signal_received("CALL");
        Metrics::trade_placed("ok");
        Metrics::trade_settled("WIN");
        Metrics::reconnect("42");

        let exposition = Metrics::gather();
        assert!(exposition.contains("blitz_signals_received_total"));
        assert!(exposition.contains("blitz_trades_settled_total"));
    }
}
