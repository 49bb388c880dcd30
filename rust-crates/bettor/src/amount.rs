//! Exact conversion between user-facing decimal token quantities and the
//! token's base units.

use crate::error::{
    Error,
    Result,
};
use alloy::primitives::U256;

/// Parses a decimal quantity such as `"100"` or `"0.25"` into base units.
///
/// Conversion is exact: trailing zeros past the token's precision are
/// accepted, any other excess fractional digit is an error.
pub fn parse_token_amount(input: &str, decimals: u8) -> Result<U256> {
    let invalid = |reason: &str| Error::InvalidAmount {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("amount is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount must be positive"));
    }
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("amount has no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("amount must be a plain decimal number"));
    }
    let fraction = fraction.trim_end_matches('0');
    let decimals = usize::from(decimals);
    if fraction.len() > decimals {
        return Err(invalid(&format!(
            "more than {decimals} decimal places cannot be represented"
        )));
    }

    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat_n('0', decimals - fraction.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Err(invalid("amount must be greater than zero"));
    }
    U256::from_str_radix(digits, 10).map_err(|_| invalid("amount is too large"))
}

/// Formats base units as a decimal quantity, always keeping one fractional
/// digit (`100.0`, `0.25`).
pub fn format_token_amount(value: U256, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    let raw = value.to_string();
    let padded = if raw.len() <= decimals {
        format!("{}{raw}", "0".repeat(decimals + 1 - raw.len()))
    } else {
        raw
    };
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{fraction}")
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn parse_token_amount__whole_and_fractional_inputs() {
        assert_eq!(parse_token_amount("100", 18).unwrap(), ether(100));
        assert_eq!(parse_token_amount("100.0", 18).unwrap(), ether(100));
        assert_eq!(
            parse_token_amount("0.25", 18).unwrap(),
            U256::from(250_000_000_000_000_000u64)
        );
        assert_eq!(parse_token_amount(".5", 2).unwrap(), U256::from(50u64));
        assert_eq!(parse_token_amount("0.000000000000000001", 18).unwrap(), U256::from(1u64));
    }

    #[test]
    fn parse_token_amount__excess_precision__is_rejected_not_truncated() {
        let err = parse_token_amount("0.0000000000000000001", 18).unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { .. }));
    }

    #[test]
    fn parse_token_amount__trailing_zeros_past_precision__are_exact() {
        assert_eq!(parse_token_amount("1.5000", 2).unwrap(), U256::from(150u64));
    }

    #[test]
    fn parse_token_amount__rejects_zero_negative_and_garbage() {
        for input in ["", "0", "0.000", "-1", "1e18", "1,5", "abc", ".", "1.2.3"] {
            assert!(
                parse_token_amount(input, 18).is_err(),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_token_amount__overflow__is_rejected() {
        let huge = "9".repeat(80);
        assert!(parse_token_amount(&huge, 18).is_err());
    }

    #[test]
    fn format_token_amount__matches_ether_style() {
        assert_eq!(format_token_amount(ether(100), 18), "100.0");
        assert_eq!(format_token_amount(U256::from(250_000_000_000_000_000u64), 18), "0.25");
        assert_eq!(format_token_amount(U256::ZERO, 18), "0.0");
        assert_eq!(format_token_amount(U256::from(1u64), 18), "0.000000000000000001");
    }

    proptest! {
        #[test]
        fn parse_token_amount__is_exact_fixed_point(
            whole in 0u64..1_000_000_000,
            fraction in 0u64..1_000_000_000_000_000_000,
        ) {
            prop_assume!(whole > 0 || fraction > 0);
            let input = format!("{whole}.{fraction:018}");
            let expected = U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
                + U256::from(fraction);

            let parsed = parse_token_amount(&input, 18).unwrap();

            prop_assert_eq!(parsed, expected);
            prop_assert_eq!(parse_token_amount(&format_token_amount(parsed, 18), 18).unwrap(), parsed);
        }
    }
}
