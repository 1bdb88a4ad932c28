//! Exact decimal-string to fixed-point integer conversion.
//!
//! Values are never routed through floating point: `"0.83"` at 8 decimals is
//! exactly `83000000`. Plain (`2448`, `0.998`) and exponent (`1e27`,
//! `2.5E-3`) notations are accepted; signs are not.

use alloy_primitives::U256;

use crate::errors::DeployError;

/// How to treat digits beyond the requested precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Extra non-zero digits are an error.
    Exact,
    /// Round half away from zero on the first dropped digit.
    HalfUp,
}

struct DecimalParts {
    digits: String,
    /// Position of the decimal point within `digits`.
    point: i64,
}

fn split_decimal(text: &str) -> Result<DecimalParts, String> {
    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err("negative values are not allowed".to_string());
    }
    let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
        Some(idx) => {
            let exp = trimmed[idx + 1..]
                .parse::<i64>()
                .map_err(|_| "malformed exponent".to_string())?;
            (&trimmed[..idx], exp)
        }
        None => (trimmed, 0),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err("empty number".to_string());
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err("not a decimal number".to_string());
    }
    let point = i64::try_from(int_part.len())
        .ok()
        .and_then(|len| len.checked_add(exponent))
        .ok_or_else(|| "exponent out of range".to_string())?;
    Ok(DecimalParts {
        digits: format!("{int_part}{frac_part}"),
        point,
    })
}

fn digits_to_u256(digits: &str) -> Result<U256, String> {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| "value exceeds 256 bits".to_string())
}

/// `value × 10^decimals` as an integer.
pub fn scale_decimal(value: &str, decimals: u32, rounding: Rounding) -> Result<U256, DeployError> {
    let fail = |message: String| DeployError::invalid(format!("decimal '{}'", value), message);
    let parts = split_decimal(value).map_err(fail)?;

    let cut = parts
        .point
        .checked_add(i64::from(decimals))
        .ok_or_else(|| fail("exponent out of range".to_string()))?;
    if cut > 96 {
        return Err(fail("value exceeds 256 bits".to_string()));
    }
    // Digits below the cut are only inspected, never padded.
    let (kept, dropped): (String, &str) = if cut < 0 {
        (String::new(), "")
    } else {
        let cut = cut as usize;
        if parts.digits.len() >= cut {
            (parts.digits[..cut].to_string(), &parts.digits[cut..])
        } else {
            let padding = "0".repeat(cut - parts.digits.len());
            (format!("{}{}", parts.digits, padding), "")
        }
    };
    let has_remainder = if cut < 0 {
        parts.digits.chars().any(|c| c != '0')
    } else {
        dropped.chars().any(|c| c != '0')
    };

    let mut result = digits_to_u256(&kept).map_err(fail)?;
    match rounding {
        Rounding::Exact if has_remainder => {
            return Err(fail(format!("more than {} decimal places", decimals)));
        }
        Rounding::HalfUp if dropped.starts_with(['5', '6', '7', '8', '9']) => {
            result = result
                .checked_add(U256::from(1))
                .ok_or_else(|| fail("value exceeds 256 bits".to_string()))?;
        }
        _ => {}
    }
    Ok(result)
}

/// Exact `value × 10^decimals`, like ethers' `parseUnits`.
pub fn parse_units(value: &str, decimals: u32) -> Result<U256, DeployError> {
    scale_decimal(value, decimals, Rounding::Exact)
}

/// Inverse of [`parse_units`] for display; trailing zeros are trimmed.
pub fn format_units(value: U256, decimals: u32) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_parse_units_fractions() {
        assert_eq!(parse_units("0.75", 18).unwrap(), ether(75) / U256::from(100));
        assert_eq!(parse_units("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_units("0.998", 8).unwrap(), U256::from(99_800_000u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5));
        assert_eq!(parse_units("2448", 8).unwrap(), U256::from(244_800_000_000u64));
    }

    #[test]
    fn test_parse_units_exponent() {
        assert_eq!(
            parse_units("1e27", 0).unwrap(),
            U256::from(10u64).pow(U256::from(27))
        );
        assert_eq!(parse_units("0.03e18", 0).unwrap(), U256::from(30_000_000_000_000_000u64));
        assert_eq!(parse_units("25E-1", 1).unwrap(), U256::from(25));
    }

    #[test]
    fn test_parse_units_rejects_excess_precision() {
        let err = parse_units("0.123", 2).unwrap_err();
        assert!(err.to_string().contains("more than 2 decimal places"));
        // trailing zeros are fine
        assert_eq!(parse_units("0.1200", 2).unwrap(), U256::from(12));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("1e", 18).is_err());
        assert!(parse_units("1e90", 18).is_err());
    }

    #[test]
    fn test_half_up_rounding() {
        assert_eq!(scale_decimal("0.125", 2, Rounding::HalfUp).unwrap(), U256::from(13));
        assert_eq!(scale_decimal("0.124", 2, Rounding::HalfUp).unwrap(), U256::from(12));
        assert_eq!(scale_decimal("0.004", 2, Rounding::HalfUp).unwrap(), U256::ZERO);
        assert_eq!(scale_decimal("0.005", 2, Rounding::HalfUp).unwrap(), U256::from(1));
        assert_eq!(scale_decimal("0.0005", 2, Rounding::HalfUp).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_extreme_exponents() {
        let err = parse_units("1e9223372036854775807", 18).unwrap_err();
        assert!(err.to_string().contains("exponent out of range"));
        assert!(parse_units("1e-9223372036854775808", 18).is_err());

        // Digits far below the scale round without padding out to the exponent
        assert!(parse_units("1e-100000000000", 18).is_err());
        assert_eq!(
            scale_decimal("9e-100000000000", 8, Rounding::HalfUp).unwrap(),
            U256::ZERO
        );
        assert_eq!(parse_units("0e-100000000000", 18).unwrap(), U256::ZERO);
        assert_eq!(scale_decimal("6e-3", 2, Rounding::HalfUp).unwrap(), U256::from(1));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(ether(1), 18), "1");
        assert_eq!(format_units(U256::from(750_000_000_000_000_000u64), 18), "0.75");
        assert_eq!(format_units(U256::from(5), 3), "0.005");
        assert_eq!(format_units(U256::from(1234), 0), "1234");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }
}
