//! Conversion between base units (integers on chain) and human-readable
//! decimal strings. Pure string arithmetic over `U256`; no floating point.

use ethers_core::types::U256;
use validator::ValidationError;

use crate::error::ToolError;

/// Smallest amount accepted by amount-taking trading tools.
pub const MIN_AMOUNT: &str = "0.000001";
const MIN_AMOUNT_DECIMALS: u8 = 6;

/// Converts `"1.5"` with 6 decimals into `1500000`.
///
/// The fractional part is truncated, or right-padded with zeros, to exactly
/// `decimals` digits and then concatenated with the whole part.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, ToolError> {
    let (whole, fraction) = split_decimal(amount)?;

    let scale = usize::from(decimals);
    let mut fraction: String = fraction.chars().take(scale).collect();
    while fraction.len() < scale {
        fraction.push('0');
    }

    let digits = format!("{}{}", whole, fraction);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits)
        .map_err(|_| ToolError::Validation(format!("amount '{}' does not fit in 256 bits", amount)))
}

/// Splits `"12.5"` into `("12", "5")`, rejecting anything that is not an
/// unsigned decimal literal.
fn split_decimal(amount: &str) -> Result<(&str, &str), ToolError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(ToolError::Validation("amount is empty".to_string()));
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction) {
        return Err(ToolError::Validation(format!(
            "'{}' is not an unsigned decimal amount",
            amount
        )));
    }
    Ok((whole, fraction))
}

/// Converts base units back into a decimal string with trailing fractional
/// zeros removed (`1000000000000000000000` with 18 decimals is `"1000"`).
pub fn to_human_units(amount: U256, decimals: u8) -> String {
    let raw = amount.to_string();
    let scale = usize::from(decimals);
    if scale == 0 {
        return raw;
    }

    let padded = if raw.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - raw.len()), raw)
    } else {
        raw
    };
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// `validator` hook: the amount must parse and be at least [`MIN_AMOUNT`].
pub fn validate_min_amount(amount: &str) -> Result<(), ValidationError> {
    match to_base_units(amount, MIN_AMOUNT_DECIMALS) {
        Ok(units) if units >= U256::one() => Ok(()),
        Ok(_) => {
            let mut err = ValidationError::new("min_amount");
            err.message = Some(format!("must be at least {}", MIN_AMOUNT).into());
            Err(err)
        }
        Err(_) => {
            let mut err = ValidationError::new("decimal");
            err.message = Some("must be an unsigned decimal string".into());
            Err(err)
        }
    }
}

/// `validator` hook for amount strings without a lower bound.
pub fn validate_decimal(amount: &str) -> Result<(), ValidationError> {
    split_decimal(amount).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("decimal");
        err.message = Some("must be an unsigned decimal string".into());
        err
    })
}
