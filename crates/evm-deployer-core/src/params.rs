//! Lending pool initialization parameters.
//!
//! [`build_pool_init_param`] turns a principal symbol and its collateral
//! symbols into the nested record passed to the pool's `initialize`. All
//! symbols are resolved before anything is built, so an unknown symbol never
//! yields a partial record. Ratios are `10^18` fixed point.

use alloy_primitives::{Address, U256};
use evm_deployer_types::AbiParam;
use evm_transport::AbiValue;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::fixed_point::parse_units;
use crate::registry::TokenRegistry;

/// Scale of every ratio in the pool configuration.
pub const RATIO_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollateralConfig {
    pub token_address: Address,
    pub collateral_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenConfig {
    pub principal_token: Address,
    pub principal_key: String,
    pub oracle: Address,
    pub collaterals: Vec<CollateralConfig>,
    pub invest_module: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeConfig {
    pub protocol_fee_rate: U256,
    pub protocol_fee_recipient: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskConfig {
    pub loan_to_value: U256,
    pub liquidation_threshold: U256,
    pub minimum_borrow_token: U256,
    pub borrow_token_cap: U256,
    pub health_factor_for_close: U256,
    pub liquidation_bonus: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateConfig {
    pub base_rate: U256,
    pub rate_slope1: U256,
    pub rate_slope2: U256,
    pub optimal_utilization_rate: U256,
    pub reserve_factor: U256,
}

/// Argument of `LendingPool.initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolInitParam {
    pub token_config: TokenConfig,
    pub fee_config: FeeConfig,
    pub risk_config: RiskConfig,
    pub rate_config: RateConfig,
}

/// Configuration shared by every pool of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStaticConfig {
    pub oracle: Address,
    pub invest_module: Address,
    pub fee: FeeConfig,
    pub risk: RiskConfig,
    pub rate: RateConfig,
}

/// Pool policy constants as written in the deployment spec.
///
/// Ratios are decimal strings scaled by `10^18`; `borrow_token_cap` is an
/// absolute integer literal such as `1e27`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySpec {
    pub protocol_fee_rate: String,
    /// Defaults to the sender account.
    pub protocol_fee_recipient: Option<String>,
    pub loan_to_value: String,
    pub liquidation_threshold: String,
    pub minimum_borrow_token: String,
    pub borrow_token_cap: String,
    pub health_factor_for_close: String,
    pub liquidation_bonus: String,
    pub base_rate: String,
    pub rate_slope1: String,
    pub rate_slope2: String,
    pub optimal_utilization_rate: String,
    pub reserve_factor: String,
}

impl Default for PolicySpec {
    fn default() -> Self {
        Self {
            protocol_fee_rate: "0.05".into(),
            protocol_fee_recipient: None,
            loan_to_value: "0.75".into(),
            liquidation_threshold: "0.8".into(),
            minimum_borrow_token: "0.1".into(),
            borrow_token_cap: "1e27".into(),
            health_factor_for_close: "0.95".into(),
            liquidation_bonus: "0.02".into(),
            base_rate: "0.02".into(),
            rate_slope1: "0.04".into(),
            rate_slope2: "0.2".into(),
            optimal_utilization_rate: "0.9".into(),
            reserve_factor: "0.08".into(),
        }
    }
}

fn ratio(value: &str) -> Result<U256, DeployError> {
    parse_units(value, RATIO_DECIMALS)
}

impl PolicySpec {
    pub fn risk(&self) -> Result<RiskConfig, DeployError> {
        Ok(RiskConfig {
            loan_to_value: ratio(&self.loan_to_value)?,
            liquidation_threshold: ratio(&self.liquidation_threshold)?,
            minimum_borrow_token: ratio(&self.minimum_borrow_token)?,
            borrow_token_cap: parse_units(&self.borrow_token_cap, 0)?,
            health_factor_for_close: ratio(&self.health_factor_for_close)?,
            liquidation_bonus: ratio(&self.liquidation_bonus)?,
        })
    }

    pub fn rate(&self) -> Result<RateConfig, DeployError> {
        Ok(RateConfig {
            base_rate: ratio(&self.base_rate)?,
            rate_slope1: ratio(&self.rate_slope1)?,
            rate_slope2: ratio(&self.rate_slope2)?,
            optimal_utilization_rate: ratio(&self.optimal_utilization_rate)?,
            reserve_factor: ratio(&self.reserve_factor)?,
        })
    }

    /// Every field that fails to parse, for spec validation.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Err(err) = self.risk() {
            issues.push(format!("policy: {err}"));
        }
        if let Err(err) = self.rate() {
            issues.push(format!("policy: {err}"));
        }
        if let Err(err) = ratio(&self.protocol_fee_rate) {
            issues.push(format!("policy: {err}"));
        }
        issues
    }

    pub fn to_static(
        &self,
        oracle: Address,
        invest_module: Address,
        fee_recipient: Address,
    ) -> Result<PoolStaticConfig, DeployError> {
        Ok(PoolStaticConfig {
            oracle,
            invest_module,
            fee: FeeConfig {
                protocol_fee_rate: ratio(&self.protocol_fee_rate)?,
                protocol_fee_recipient: fee_recipient,
            },
            risk: self.risk()?,
            rate: self.rate()?,
        })
    }
}

/// Resolve `principal` and `collaterals` and assemble the init record.
///
/// Collateral order is preserved.
pub fn build_pool_init_param(
    collaterals: &[String],
    principal: &str,
    tokens: &TokenRegistry,
    config: &PoolStaticConfig,
) -> Result<PoolInitParam, DeployError> {
    let principal_entry = tokens.get(principal)?;
    let collateral_entries = collaterals
        .iter()
        .map(|symbol| tokens.get(symbol))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PoolInitParam {
        token_config: TokenConfig {
            principal_token: principal_entry.address,
            principal_key: crate::registry::feed_key(&principal_entry.symbol),
            oracle: config.oracle,
            collaterals: collateral_entries
                .into_iter()
                .map(|entry| CollateralConfig {
                    token_address: entry.address,
                    collateral_key: crate::registry::feed_key(&entry.symbol),
                })
                .collect(),
            invest_module: config.invest_module,
        },
        fee_config: config.fee.clone(),
        risk_config: config.risk.clone(),
        rate_config: config.rate.clone(),
    })
}

impl PoolInitParam {
    /// The nested tuple passed to `initialize`.
    pub fn to_abi_value(&self) -> AbiValue {
        let token = &self.token_config;
        let fee = &self.fee_config;
        let risk = &self.risk_config;
        let rate = &self.rate_config;
        AbiValue::Tuple(vec![
            AbiValue::Tuple(vec![
                AbiValue::Address(token.principal_token),
                AbiValue::String(token.principal_key.clone()),
                AbiValue::Address(token.oracle),
                AbiValue::Array(
                    token
                        .collaterals
                        .iter()
                        .map(|c| {
                            AbiValue::Tuple(vec![
                                AbiValue::Address(c.token_address),
                                AbiValue::String(c.collateral_key.clone()),
                            ])
                        })
                        .collect(),
                ),
                AbiValue::Address(token.invest_module),
            ]),
            AbiValue::Tuple(vec![
                AbiValue::Uint(fee.protocol_fee_rate),
                AbiValue::Address(fee.protocol_fee_recipient),
            ]),
            AbiValue::Tuple(vec![
                AbiValue::Uint(risk.loan_to_value),
                AbiValue::Uint(risk.liquidation_threshold),
                AbiValue::Uint(risk.minimum_borrow_token),
                AbiValue::Uint(risk.borrow_token_cap),
                AbiValue::Uint(risk.health_factor_for_close),
                AbiValue::Uint(risk.liquidation_bonus),
            ]),
            AbiValue::Tuple(vec![
                AbiValue::Uint(rate.base_rate),
                AbiValue::Uint(rate.rate_slope1),
                AbiValue::Uint(rate.rate_slope2),
                AbiValue::Uint(rate.optimal_utilization_rate),
                AbiValue::Uint(rate.reserve_factor),
            ]),
        ])
    }

    /// ABI parameter describing [`to_abi_value`](Self::to_abi_value).
    pub fn abi_param() -> AbiParam {
        fn field(kind: &str, name: &str) -> AbiParam {
            AbiParam {
                name: name.to_string(),
                kind: kind.to_string(),
                components: Vec::new(),
            }
        }
        fn tuple(kind: &str, name: &str, components: Vec<AbiParam>) -> AbiParam {
            AbiParam {
                name: name.to_string(),
                kind: kind.to_string(),
                components,
            }
        }

        tuple(
            "tuple",
            "initParam",
            vec![
                tuple(
                    "tuple",
                    "tokenConfig",
                    vec![
                        field("address", "principalToken"),
                        field("string", "principalKey"),
                        field("address", "oracle"),
                        tuple(
                            "tuple[]",
                            "collaterals",
                            vec![field("address", "tokenAddress"), field("string", "collateralKey")],
                        ),
                        field("address", "investModule"),
                    ],
                ),
                tuple(
                    "tuple",
                    "feeConfig",
                    vec![
                        field("uint256", "protocolFeeRate"),
                        field("address", "protocolFeeRecipient"),
                    ],
                ),
                tuple(
                    "tuple",
                    "riskConfig",
                    vec![
                        field("uint256", "loanToValue"),
                        field("uint256", "liquidationThreshold"),
                        field("uint256", "minimumBorrowToken"),
                        field("uint256", "borrowTokenCap"),
                        field("uint256", "healthFactorForClose"),
                        field("uint256", "liquidationBonus"),
                    ],
                ),
                tuple(
                    "tuple",
                    "rateConfig",
                    vec![
                        field("uint256", "baseRate"),
                        field("uint256", "rateSlope1"),
                        field("uint256", "rateSlope2"),
                        field("uint256", "optimalUtilizationRate"),
                        field("uint256", "reserveFactor"),
                    ],
                ),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TokenEntry;
    use evm_deployer_types::{AbiEntry, InterfaceDescriptor};

    fn e18(text: &str) -> U256 {
        parse_units(text, 18).unwrap()
    }

    fn tokens() -> TokenRegistry {
        let symbols = ["USDT", "USDC", "XUSD", "eMPX", "XFT", "lpUSD"];
        TokenRegistry::from_tokens(symbols.iter().enumerate().map(|(i, s)| TokenEntry {
            symbol: s.to_string(),
            address: Address::repeat_byte(i as u8 + 1),
            decimals: 18,
        }))
        .unwrap()
    }

    fn static_config() -> PoolStaticConfig {
        PolicySpec::default()
            .to_static(
                Address::repeat_byte(0xaa),
                Address::repeat_byte(0xbb),
                Address::repeat_byte(0xcc),
            )
            .unwrap()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_policy_values() {
        let config = static_config();
        assert_eq!(config.fee.protocol_fee_rate, e18("0.05"));
        assert_eq!(config.risk.loan_to_value, U256::from(750_000_000_000_000_000u64));
        assert_eq!(config.risk.liquidation_threshold, e18("0.8"));
        assert_eq!(config.risk.borrow_token_cap, U256::from(10u64).pow(U256::from(27)));
        assert_eq!(config.rate.rate_slope2, e18("0.2"));
        assert_eq!(config.rate.reserve_factor, e18("0.08"));
    }

    #[test]
    fn test_usdt_pool() {
        let param = build_pool_init_param(
            &symbols(&["xusd", "empx", "xft", "lpusd"]),
            "USDT",
            &tokens(),
            &static_config(),
        )
        .unwrap();
        let token = &param.token_config;
        assert_eq!(token.principal_token, Address::repeat_byte(1));
        assert_eq!(token.principal_key, "usdt/usd");
        let keys: Vec<_> = token.collaterals.iter().map(|c| c.collateral_key.as_str()).collect();
        assert_eq!(keys, vec!["xusd/usd", "empx/usd", "xft/usd", "lpusd/usd"]);
        assert_eq!(token.oracle, Address::repeat_byte(0xaa));
        assert_eq!(param.fee_config.protocol_fee_recipient, Address::repeat_byte(0xcc));
    }

    #[test]
    fn test_unknown_collateral_fails_whole_build() {
        let err = build_pool_init_param(
            &symbols(&["xusd", "doge"]),
            "USDT",
            &tokens(),
            &static_config(),
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::UnknownSymbol { symbol } if symbol == "doge"));
    }

    #[test]
    fn test_unknown_principal() {
        let err = build_pool_init_param(&[], "WBTC", &tokens(), &static_config()).unwrap_err();
        assert!(matches!(err, DeployError::UnknownSymbol { .. }));
    }

    #[test]
    fn test_invalid_policy_reported() {
        let policy = PolicySpec {
            loan_to_value: "abc".into(),
            base_rate: "-1".into(),
            ..PolicySpec::default()
        };
        assert_eq!(policy.issues().len(), 2);
    }

    #[test]
    fn test_abi_value_matches_initialize_signature() {
        let entry = AbiEntry {
            entry_type: "function".into(),
            name: Some("initialize".into()),
            inputs: vec![PoolInitParam::abi_param()],
            outputs: Vec::new(),
            state_mutability: Some("nonpayable".into()),
        };
        assert_eq!(
            entry.signature().unwrap(),
            "initialize(((address,string,address,(address,string)[],address),(uint256,address),(uint256,uint256,uint256,uint256,uint256,uint256),(uint256,uint256,uint256,uint256,uint256)))"
        );

        let param = build_pool_init_param(
            &symbols(&["xusd"]),
            "usdc",
            &tokens(),
            &static_config(),
        )
        .unwrap();
        let interface = InterfaceDescriptor::new(vec![entry]);
        let calldata =
            evm_transport::abi::encode_call(&interface, "initialize", &[param.to_abi_value()])
                .unwrap();
        assert_eq!(calldata.len() % 32, 4);
    }
}
