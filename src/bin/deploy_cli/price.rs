//! Oracle price commands - pack and unpack price words offline

use alloy_primitives::U256;
use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;

use evm_deployer::core::fixed_point::format_units;
use evm_deployer::core::oracle::{DEFAULT_BACKDATE_SECS, PRICE_DECIMALS};
use evm_deployer::core::{decode_price, encode_price, oracle_timestamp, TimestampUnit};

use super::output::format_error;
use super::CliContext;

#[derive(Parser, Debug)]
pub struct EncodePriceCmd {
    /// Decimal price, e.g. 2448.5 or 1e-4
    pub price: String,

    /// Unix timestamp to pack (default: now minus --backdate)
    #[arg(long)]
    pub timestamp: Option<u64>,

    /// Seconds subtracted from the current time
    #[arg(long, default_value_t = DEFAULT_BACKDATE_SECS)]
    pub backdate: u64,

    /// Pack the timestamp in milliseconds
    #[arg(long)]
    pub millis: bool,
}

#[derive(Parser, Debug)]
pub struct DecodePriceCmd {
    /// Packed value, decimal or 0x-prefixed hex
    pub value: String,

    /// Read the packed timestamp as milliseconds
    #[arg(long)]
    pub millis: bool,
}

fn timestamp_unit(millis: bool) -> TimestampUnit {
    if millis {
        TimestampUnit::Milliseconds
    } else {
        TimestampUnit::Seconds
    }
}

#[derive(Serialize)]
struct PriceJson {
    price: String,
    mantissa: String,
    timestamp: String,
    timestamp_unit: TimestampUnit,
    packed: String,
    packed_hex: String,
}

impl PriceJson {
    fn new(packed: U256, unit: TimestampUnit) -> Self {
        let (mantissa, timestamp) = decode_price(packed);
        Self {
            price: format_units(mantissa, PRICE_DECIMALS),
            mantissa: mantissa.to_string(),
            timestamp: timestamp.to_string(),
            timestamp_unit: unit,
            packed: packed.to_string(),
            packed_hex: format!("{:#066x}", packed),
        }
    }

    fn render(&self, json_output: bool) -> Result<String> {
        if json_output {
            return Ok(serde_json::to_string_pretty(self)?);
        }
        let mut out = String::new();
        out.push_str(&format!("Price:     {}\n", self.price));
        out.push_str(&format!("Mantissa:  {}\n", self.mantissa));
        out.push_str(&format!("Timestamp: {}", self.timestamp));
        let when = self
            .timestamp
            .parse::<i64>()
            .ok()
            .and_then(|ts| match self.timestamp_unit {
                TimestampUnit::Seconds => chrono::DateTime::from_timestamp(ts, 0),
                TimestampUnit::Milliseconds => chrono::DateTime::from_timestamp_millis(ts),
            });
        if let Some(when) = when {
            out.push_str(&format!(" ({})", when.to_rfc3339()));
        }
        out.push('\n');
        out.push_str(&format!("Packed:    {}\n", self.packed));
        out.push_str(&format!("Hex:       {}", self.packed_hex));
        Ok(out)
    }
}

impl EncodePriceCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let unit = timestamp_unit(self.millis);
        let result = self
            .encode()
            .and_then(|packed| PriceJson::new(packed, unit).render(ctx.json));
        finish(result, ctx.json)
    }

    fn encode(&self) -> Result<U256> {
        let timestamp = match self.timestamp {
            Some(ts) => U256::from(ts),
            None => {
                let unit = timestamp_unit(self.millis);
                oracle_timestamp(unit.now(), unit.from_secs(self.backdate))
            }
        };
        Ok(encode_price(&self.price, timestamp)?)
    }
}

impl DecodePriceCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let result = self
            .value
            .trim()
            .parse::<U256>()
            .map_err(|e| anyhow!("invalid packed value `{}`: {}", self.value, e))
            .and_then(|packed| PriceJson::new(packed, timestamp_unit(self.millis)).render(ctx.json));
        finish(result, ctx.json)
    }
}

fn finish(result: Result<String>, json_output: bool) -> Result<()> {
    match result {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, json_output));
            Err(e)
        }
    }
}
