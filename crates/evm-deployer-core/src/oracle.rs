//! Oracle price packing.
//!
//! The oracle stores each feed as one 256-bit word: the price scaled by
//! `10^8` in the high 128 bits and the observation timestamp in the low 128
//! bits. The timestamp is unix seconds unless the deployment selects
//! [`TimestampUnit::Milliseconds`] for oracles that compare against a
//! millisecond clock.

use alloy_primitives::U256;
use evm_transport::AbiValue;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::DeployError;
use crate::fixed_point::{scale_decimal, Rounding};

/// Decimal places of the price mantissa.
pub const PRICE_DECIMALS: u32 = 8;

/// Seconds subtracted from "now" so the oracle never sees a future timestamp.
pub const DEFAULT_BACKDATE_SECS: u64 = 60;

/// Unit of the timestamp packed next to each price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl TimestampUnit {
    /// Convert a duration or instant given in seconds into this unit.
    pub fn from_secs(self, secs: u64) -> u64 {
        match self {
            TimestampUnit::Seconds => secs,
            TimestampUnit::Milliseconds => secs.saturating_mul(1000),
        }
    }

    /// Wall-clock time in this unit.
    pub fn now(self) -> u64 {
        let now = chrono::Utc::now();
        let value = match self {
            TimestampUnit::Seconds => now.timestamp(),
            TimestampUnit::Milliseconds => now.timestamp_millis(),
        };
        value.max(0) as u64
    }
}

fn limit() -> U256 {
    U256::from(1u8) << 128
}

/// `round_half_up(price × 10^8)`, computed from the decimal text.
pub fn price_mantissa(price: &str) -> Result<U256, DeployError> {
    scale_decimal(price, PRICE_DECIMALS, Rounding::HalfUp)
}

/// `mantissa × 2^128 + timestamp`.
pub fn encode_mantissa(mantissa: U256, timestamp: U256) -> Result<U256, DeployError> {
    if mantissa >= limit() {
        return Err(DeployError::EncodingOverflow {
            field: "mantissa".to_string(),
            value: mantissa.to_string(),
        });
    }
    if timestamp >= limit() {
        return Err(DeployError::EncodingOverflow {
            field: "timestamp".to_string(),
            value: timestamp.to_string(),
        });
    }
    Ok((mantissa << 128) | timestamp)
}

/// Pack a decimal price with its timestamp.
pub fn encode_price(price: &str, timestamp: U256) -> Result<U256, DeployError> {
    encode_mantissa(price_mantissa(price)?, timestamp)
}

/// Split a packed value into `(mantissa, timestamp)`.
pub fn decode_price(packed: U256) -> (U256, U256) {
    (packed >> 128, packed & (limit() - U256::from(1u8)))
}

/// The timestamp written with a batch: `now - backdate`, floored at zero.
/// Both arguments are in the same unit.
pub fn oracle_timestamp(now: u64, backdate: u64) -> U256 {
    U256::from(now.saturating_sub(backdate))
}

/// One feed update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OraclePriceEntry {
    /// Feed key, e.g. `weth/usd`.
    pub key: String,
    pub value: U256,
}

/// Encoded entries plus the ones that failed to encode.
#[derive(Debug, Clone, Default)]
pub struct PriceBatch {
    pub entries: Vec<OraclePriceEntry>,
    pub failures: Vec<(String, DeployError)>,
}

impl PriceBatch {
    /// Arguments for `setMultipleValues(string[],uint256[])`.
    pub fn to_call_args(&self) -> Vec<AbiValue> {
        let keys = self
            .entries
            .iter()
            .map(|e| AbiValue::String(e.key.clone()))
            .collect();
        let values = self.entries.iter().map(|e| AbiValue::Uint(e.value)).collect();
        vec![AbiValue::Array(keys), AbiValue::Array(values)]
    }
}

/// Encode every `(key, price)` pair at one shared timestamp. `now` and
/// `backdate` share a unit.
///
/// A failing entry is reported in [`PriceBatch::failures`]; the rest are
/// still encoded.
pub fn build_price_batch(prices: &[(String, String)], now: u64, backdate: u64) -> PriceBatch {
    let timestamp = oracle_timestamp(now, backdate);
    let mut batch = PriceBatch::default();
    for (key, price) in prices {
        match encode_price(price, timestamp) {
            Ok(value) => batch.entries.push(OraclePriceEntry {
                key: key.clone(),
                value,
            }),
            Err(err) => {
                warn!(key = %key, error = %err, "skipping price entry");
                batch.failures.push((key.clone(), err));
            }
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_value() {
        // 0.83 -> 83_000_000 in the high half
        let packed = encode_price("0.83", U256::from(1_700_000_000u64)).unwrap();
        let expected = (U256::from(83_000_000u64) << 128) + U256::from(1_700_000_000u64);
        assert_eq!(packed, expected);
    }

    #[test]
    fn test_decode_is_inverse() {
        let ts = U256::from(1_700_000_000u64);
        let packed = encode_price("2448", ts).unwrap();
        assert_eq!(decode_price(packed), (U256::from(244_800_000_000u64), ts));
    }

    #[test]
    fn test_rounds_half_up() {
        assert_eq!(price_mantissa("0.000000015").unwrap(), U256::from(2));
        assert_eq!(price_mantissa("0.000000014").unwrap(), U256::from(1));
        assert_eq!(price_mantissa("0.998").unwrap(), U256::from(99_800_000u64));
    }

    #[test]
    fn test_overflow_bounds() {
        let max = limit() - U256::from(1u8);
        assert!(encode_mantissa(max, max).is_ok());
        assert!(matches!(
            encode_mantissa(limit(), U256::ZERO),
            Err(DeployError::EncodingOverflow { ref field, .. }) if field == "mantissa"
        ));
        assert!(matches!(
            encode_mantissa(U256::ZERO, limit()),
            Err(DeployError::EncodingOverflow { ref field, .. }) if field == "timestamp"
        ));
        // 2^128 / 10^8 is about 3.4e30; a price of 1e31 cannot be packed
        assert!(encode_price("1e31", U256::ZERO).is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(matches!(
            encode_price("-1", U256::ZERO),
            Err(DeployError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_timestamp_backdate() {
        assert_eq!(oracle_timestamp(1000, 60), U256::from(940));
        assert_eq!(oracle_timestamp(30, 60), U256::ZERO);
    }

    #[test]
    fn test_millisecond_timestamps() {
        let unit = TimestampUnit::Milliseconds;
        assert_eq!(unit.from_secs(60), 60_000);
        assert_eq!(TimestampUnit::Seconds.from_secs(60), 60);
        assert_eq!(unit.from_secs(u64::MAX), u64::MAX);

        let now_ms = 1_700_000_000_123u64;
        let prices = vec![("weth/usd".to_string(), "2448".to_string())];
        let batch = build_price_batch(&prices, now_ms, unit.from_secs(DEFAULT_BACKDATE_SECS));
        assert_eq!(
            decode_price(batch.entries[0].value).1,
            U256::from(1_699_999_940_123u64)
        );

        // Wall clock in ms is three orders of magnitude above seconds
        assert!(unit.now() / 1000 >= TimestampUnit::Seconds.now().saturating_sub(1));
    }

    #[test]
    fn test_timestamp_unit_names() {
        let unit: TimestampUnit = serde_yaml::from_str("milliseconds").unwrap();
        assert_eq!(unit, TimestampUnit::Milliseconds);
        assert_eq!(TimestampUnit::default(), TimestampUnit::Seconds);
        assert!(serde_yaml::from_str::<TimestampUnit>("minutes").is_err());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let prices = vec![
            ("xusd/usd".to_string(), "0.83".to_string()),
            ("bad/usd".to_string(), "oops".to_string()),
            ("weth/usd".to_string(), "2448".to_string()),
        ];
        let batch = build_price_batch(&prices, 1060, 60);
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0, "bad/usd");
        assert_eq!(decode_price(batch.entries[1].value).1, U256::from(1000));

        let args = batch.to_call_args();
        assert!(matches!(&args[0], AbiValue::Array(keys) if keys.len() == 2));
    }
}
