//! Utilities for precise decimal arithmetic with U256 values
//!
//! Token amounts stay in integer smallest units end to end; `Decimal` is only
//! used at the human-readable edges (parsing "1.5", printing balances, slippage
//! percentages).

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

use super::ServiceResult;
use super::error::ServiceError;

/// Basis points in 100%.
const BPS_DENOMINATOR: u64 = 10_000;

/// Convert U256 to Decimal with proper decimal scaling
///
/// # Arguments
/// * `value` - The U256 value to convert
/// * `decimals` - Number of decimal places (e.g., 18 for MON)
///
/// # Returns
/// A Decimal representing the actual value (e.g., 1.5 instead of 1500000000000000000)
pub fn u256_to_decimal(value: U256, decimals: u8) -> ServiceResult<Decimal> {
    Decimal::from_str_exact(&format_balance(value, decimals))
        .map(|d| d.normalize())
        .map_err(|e| {
            ServiceError::InvalidAmount(format!("Failed to parse U256 to Decimal: {}", e))
        })
}

/// Convert Decimal to U256 with proper decimal scaling, truncating any
/// precision beyond `decimals`.
pub fn decimal_to_u256(value: Decimal, decimals: u8) -> ServiceResult<U256> {
    parse_amount(&value.normalize().to_string(), decimals)
}

/// Parse human-readable amount (e.g., "1.5") to smallest unit based on decimals
///
/// # Arguments
/// * `amount` - Human-readable amount as string (e.g., "1.5" for 1.5 MON)
/// * `decimals` - Number of decimal places for the token
///
/// # Examples
/// - "1" with 18 decimals -> 1000000000000000000
/// - "100.5" with 6 decimals -> 100500000
///
/// # Returns
/// U256 value in smallest unit. Digits beyond `decimals` are truncated.
pub fn parse_amount(amount: &str, decimals: u8) -> ServiceResult<U256> {
    let amount = amount.trim();
    let invalid = || ServiceError::InvalidAmount(format!("Invalid amount format: {amount:?}"));

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let decimals = decimals as usize;
    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    if fraction.len() >= decimals {
        digits.push_str(&fraction[..decimals]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat_n('0', decimals - fraction.len()));
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str(digits).map_err(|e| ServiceError::InvalidAmount(format!("Amount out of range: {e}")))
}

/// Format balance from smallest unit to human-readable format
///
/// # Returns
/// Formatted balance as string with trailing zeros removed
pub fn format_balance(balance: U256, decimals: u8) -> String {
    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = balance / divisor;
    let remainder = balance % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_part = remainder.to_string();
        let padded = format!("{:0>width$}", decimal_part, width = decimals as usize);
        let trimmed = padded.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{whole}.{trimmed}")
        }
    }
}

/// Converts a slippage percentage (e.g. `0.5` for 0.5%) into basis points.
///
/// Fails with `SlippageExceeded` outside `[0, 100)`.
pub fn slippage_to_bps(slippage: Decimal) -> ServiceResult<u64> {
    if slippage.is_sign_negative() || slippage >= Decimal::from(100) {
        return Err(ServiceError::SlippageExceeded(slippage.to_string()));
    }
    (slippage * Decimal::from(100))
        .trunc()
        .to_u64()
        .ok_or_else(|| ServiceError::SlippageExceeded(slippage.to_string()))
}

/// Calculate minimum output amount with slippage tolerance
///
/// # Arguments
/// * `amount_out` - Expected output amount
/// * `slippage` - Slippage tolerance as a percentage (e.g., 0.5 for 0.5%)
///
/// # Returns
/// Minimum acceptable output amount, rounded down
pub fn calculate_minimum_output(amount_out: U256, slippage: Decimal) -> ServiceResult<U256> {
    let bps = slippage_to_bps(slippage)?;
    let keep = U256::from(BPS_DENOMINATOR - bps);
    Ok(amount_out.saturating_mul(keep) / U256::from(BPS_DENOMINATOR))
}

/// Calculate maximum input amount with slippage tolerance, rounded up.
pub fn calculate_maximum_input(amount_in: U256, slippage: Decimal) -> ServiceResult<U256> {
    let bps = slippage_to_bps(slippage)?;
    let scaled = amount_in.saturating_mul(U256::from(BPS_DENOMINATOR + bps));
    let denominator = U256::from(BPS_DENOMINATOR);
    Ok(scaled.div_ceil(denominator))
}

/// Unix timestamp `secs` seconds from now, as a router deadline.
pub fn deadline_from_now(secs: u64) -> U256 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    U256::from(now.saturating_add(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_to_decimal_should_work() {
        let wei = U256::from_str("1500000000000000000").unwrap();
        let mon = u256_to_decimal(wei, 18).unwrap();
        assert_eq!(mon.to_string(), "1.5");
    }

    #[test]
    fn test_decimal_to_u256_should_work() {
        let mon = Decimal::from_str("1.5").unwrap();
        let wei = decimal_to_u256(mon, 18).unwrap();
        assert_eq!(wei, U256::from_str("1500000000000000000").unwrap());
    }

    #[test]
    fn test_parse_amount_should_work() {
        let amount = parse_amount("1.5", 18).unwrap();
        assert_eq!(amount, U256::from_str("1500000000000000000").unwrap());

        let amount = parse_amount("100.5", 6).unwrap();
        assert_eq!(amount, U256::from(100500000u64));

        assert_eq!(parse_amount(".25", 2).unwrap(), U256::from(25u64));
        assert_eq!(parse_amount("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_parse_amount_truncates_extra_precision() {
        assert_eq!(parse_amount("1.23456789", 6).unwrap(), U256::from(1_234_567u64));
    }

    #[test]
    fn test_parse_amount_handles_large_values() {
        let amount = parse_amount("1000000000000", 18).unwrap();
        assert_eq!(amount, U256::from(10u64).pow(U256::from(30u64)));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(matches!(parse_amount("abc", 18), Err(ServiceError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-1", 18), Err(ServiceError::InvalidAmount(_))));
        assert!(matches!(parse_amount(".", 18), Err(ServiceError::InvalidAmount(_))));
        assert!(matches!(parse_amount("", 18), Err(ServiceError::InvalidAmount(_))));
    }

    #[test]
    fn test_format_balance_should_work() {
        let wei = U256::from_str("1500000000000000000").unwrap();
        assert_eq!(format_balance(wei, 18), "1.5");
        assert_eq!(format_balance(U256::from(100500000u64), 6), "100.5");
        assert_eq!(format_balance(U256::from(5u64), 18), "0.000000000000000005");
    }

    #[test]
    fn test_format_balance_whole_number_should_work() {
        let wei = U256::from_str("1000000000000000000").unwrap();
        assert_eq!(format_balance(wei, 18), "1");
    }

    #[test]
    fn test_calculate_minimum_output_should_work() {
        // 1000 tokens with 0.5% slippage = 995 minimum
        let slippage = Decimal::from_str("0.5").unwrap();
        let minimum = calculate_minimum_output(U256::from(1000u64), slippage).unwrap();
        assert_eq!(minimum, U256::from(995u64));
    }

    #[test]
    fn test_calculate_minimum_output_zero_slippage() {
        let minimum = calculate_minimum_output(U256::from(1000u64), Decimal::ZERO).unwrap();
        assert_eq!(minimum, U256::from(1000u64));
    }

    #[test]
    fn test_calculate_maximum_input_rounds_up() {
        // 1001 * 1.01 = 1011.01 -> 1012
        let slippage = Decimal::from(1);
        let maximum = calculate_maximum_input(U256::from(1001u64), slippage).unwrap();
        assert_eq!(maximum, U256::from(1012u64));
    }

    #[test]
    fn test_slippage_out_of_range_is_rejected() {
        assert!(matches!(
            calculate_minimum_output(U256::from(1u64), Decimal::from(100)),
            Err(ServiceError::SlippageExceeded(_))
        ));
        assert!(matches!(
            slippage_to_bps(Decimal::from(-1)),
            Err(ServiceError::SlippageExceeded(_))
        ));
    }

    #[test]
    fn test_deadline_is_in_the_future() {
        let now = U256::from(chrono::Utc::now().timestamp() as u64);
        let deadline = deadline_from_now(3600);
        assert!(deadline >= now + U256::from(3600u64));
        assert!(deadline <= now + U256::from(3601u64));
    }
}
