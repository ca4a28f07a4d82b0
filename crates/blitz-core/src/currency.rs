//! Per-currency stake rules.
//!
//! The brokerage enforces a minimum stake per account currency; every
//! computed trade amount is clamped upward to this floor before placement.

use rust_decimal::Decimal;

/// Minimum stake for an account currency.
///
/// Unlisted currencies use a floor of 1.
pub fn minimum_stake(currency: &str) -> Decimal {
    match currency.to_ascii_uppercase().as_str() {
        "NGN" => Decimal::from(1500),
        "USD" | "EUR" | "GBP" => Decimal::ONE,
        "BRL" | "AED" => Decimal::from(5),
        "INR" => Decimal::from(70),
        "MXN" | "ZAR" => Decimal::from(20),
        _ => Decimal::ONE,
    }
}

/// Display symbol for an account currency, falling back to the code itself.
pub fn currency_symbol(currency: &str) -> String {
    match currency.to_ascii_uppercase().as_str() {
        "NGN" => "₦".to_string(),
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "BRL" => "R$".to_string(),
        other => format!("{other} "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minimum_stake_known_currencies() {
        assert_eq!(minimum_stake("NGN"), dec!(1500));
        assert_eq!(minimum_stake("usd"), dec!(1));
        assert_eq!(minimum_stake("INR"), dec!(70));
        assert_eq!(minimum_stake("ZAR"), dec!(20));
    }

    #[test]
    fn test_minimum_stake_unknown_currency() {
        assert_eq!(minimum_stake("XYZ"), dec!(1));
    }

    #[test]
    fn test_currency_symbol() {
        assert_eq!(currency_symbol("NGN"), "₦");
        assert_eq!(currency_symbol("usd"), "$");
        assert_eq!(currency_symbol("JPY"), "JPY ");
    }
}
