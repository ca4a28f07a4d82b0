//! Static instrument directory.
//!
//! Maps broker-internal instrument ids to human-readable symbols and back.
//! Read-only after construction, so one directory can be shared across all
//! connections without synchronization.

use std::collections::HashMap;

/// Fallback instrument used when a symbol has no mapping.
pub const DEFAULT_INSTRUMENT_ID: u32 = 1861; // EURUSD

/// Bidirectional instrument id <-> symbol mapping.
#[derive(Debug, Clone)]
pub struct AssetDirectory {
    by_id: HashMap<u32, String>,
    fallback_id: u32,
}

impl AssetDirectory {
    /// Build a directory from explicit (id, symbol) pairs.
    pub fn new(entries: impl IntoIterator<Item = (u32, String)>, fallback_id: u32) -> Self {
        Self {
            by_id: entries.into_iter().collect(),
            fallback_id,
        }
    }

    /// The brokerage's instrument table as observed in production.
    pub fn with_defaults() -> Self {
        let entries = [
            (1861, "EURUSD"),
            (2, "GBPUSD"),
            (3, "USDJPY"),
            (4, "AUDUSD"),
            (5, "USDCAD"),
            (6, "USDCHF"),
            (7, "NZDUSD"),
            (76, "EURUSD-OTC"),
            (77, "GBPUSD-OTC"),
            (78, "AUDUSD-OTC"),
            (79, "USDCAD-OTC"),
            (80, "USDCHF-OTC"),
            (81, "NZDUSD-OTC"),
            (82, "USDJPY-OTC"),
            (2301, "PENUSD-OTC"),
            (1961, "GOLD"),
        ];
        Self::new(
            entries.into_iter().map(|(id, s)| (id, s.to_string())),
            DEFAULT_INSTRUMENT_ID,
        )
    }

    /// Resolve an instrument id to its symbol.
    ///
    /// Unmapped ids resolve to `"Unknown-ID:<id>"` rather than failing, so
    /// position pushes for unknown instruments stay displayable.
    pub fn resolve(&self, id: u32) -> String {
        self.by_id
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown-ID:{id}"))
    }

    /// Look up the instrument id for a symbol, falling back to the
    /// configured default instrument when no mapping exists.
    pub fn id_for(&self, symbol: &str) -> u32 {
        self.by_id
            .iter()
            .find(|(_, s)| s.as_str() == symbol)
            .map(|(id, _)| *id)
            .unwrap_or(self.fallback_id)
    }

    /// The configured fallback instrument id.
    pub fn fallback_id(&self) -> u32 {
        self.fallback_id
    }
}

impl Default for AssetDirectory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_id() {
        let dir = AssetDirectory::with_defaults();
        assert_eq!(dir.resolve(1861), "EURUSD");
        assert_eq!(dir.resolve(76), "EURUSD-OTC");
        assert_eq!(dir.resolve(1961), "GOLD");
    }

    #[test]
    fn test_resolve_unknown_id() {
        let dir = AssetDirectory::with_defaults();
        assert_eq!(dir.resolve(99999), "Unknown-ID:99999");
    }

    #[test]
    fn test_id_for_known_symbol() {
        let dir = AssetDirectory::with_defaults();
        assert_eq!(dir.id_for("GBPUSD"), 2);
        assert_eq!(dir.id_for("USDJPY-OTC"), 82);
    }

    #[test]
    fn test_id_for_unknown_symbol_falls_back() {
        let dir = AssetDirectory::with_defaults();
        assert_eq!(dir.id_for("DOGEUSD"), DEFAULT_INSTRUMENT_ID);
    }

    #[test]
    fn test_round_trip() {
        let dir = AssetDirectory::with_defaults();
        let id = dir.id_for("AUDUSD");
        assert_eq!(dir.resolve(id), "AUDUSD");
    }
}
