//! Fixed-point conversion between decimal human units and base integer units.
//!
//! Callers supply amounts as decimal strings ("0.01" ether); everything sent
//! to the chain is a base-unit integer. Conversion is deterministic at a
//! declared number of decimals and round-trips without precision loss for
//! values representable in the scale.

use alloy_primitives::{
    U256,
    utils::{ParseUnits, Unit},
};

/// Decimals of the chain's native currency.
pub const ETHER_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("unsupported decimal scale {0}")]
    Scale(u8),
    #[error("negative amounts are not allowed")]
    Negative,
    #[error("invalid decimal amount: {0}")]
    Parse(String),
}

/// Convert a decimal string to base units at the given scale.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let unit = Unit::new(decimals).ok_or(AmountError::Scale(decimals))?;
    match ParseUnits::parse_units(amount, unit).map_err(|err| AmountError::Parse(err.to_string()))? {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(AmountError::Negative),
    }
}

/// Render base units as a decimal string at the given scale, trimming an
/// all-zero fractional tail.
pub fn format_amount(value: U256, decimals: u8) -> Result<String, AmountError> {
    let unit = Unit::new(decimals).ok_or(AmountError::Scale(decimals))?;
    let formatted = ParseUnits::U256(value).format_units(unit);
    Ok(match formatted.split_once('.') {
        Some((integer, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                integer.to_string()
            } else {
                format!("{integer}.{fraction}")
            }
        }
        None => formatted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_to_base_units() {
        assert_eq!(
            parse_amount("0.01", ETHER_DECIMALS).unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
        assert_eq!(
            parse_amount("1.5", ETHER_DECIMALS).unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
        assert_eq!(parse_amount("3", 0).unwrap(), U256::from(3));
    }

    #[test]
    fn round_trips_without_precision_loss() {
        for amount in ["0.01", "1.5", "0.000000000000000001", "12345.6789"] {
            let base = parse_amount(amount, ETHER_DECIMALS).unwrap();
            assert_eq!(format_amount(base, ETHER_DECIMALS).unwrap(), amount);
        }
    }

    #[test]
    fn whole_amounts_drop_the_fraction() {
        let base = parse_amount("2", ETHER_DECIMALS).unwrap();
        assert_eq!(format_amount(base, ETHER_DECIMALS).unwrap(), "2");
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert_eq!(parse_amount("-1", ETHER_DECIMALS), Err(AmountError::Negative));
        assert!(matches!(parse_amount("abc", ETHER_DECIMALS), Err(AmountError::Parse(_))));
        assert_eq!(parse_amount("1", 200), Err(AmountError::Scale(200)));
    }
}
