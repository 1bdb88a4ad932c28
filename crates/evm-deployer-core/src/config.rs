//! Deployment spec loading and validation.
//!
//! A spec is one YAML or JSON file describing the network, the compiled
//! units to deploy and the protocol parameters. Validation collects every
//! problem before failing so one edit pass can fix them all.

use anyhow::{bail, Context, Result};
use evm_deployer_types::{env_utils, RetryConfig, UnitId};
use evm_linker::parse_address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fixed_point::parse_units;
use crate::oracle::{price_mantissa, TimestampUnit, DEFAULT_BACKDATE_SECS};
use crate::params::PolicySpec;

pub const SUPPORTED_SPEC_VERSION: u32 = 1;

/// Declarative description of one protocol deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSpec {
    #[serde(default = "default_spec_version")]
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network: NetworkSpec,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Units deployed through linked waves, in any order.
    #[serde(default)]
    pub libraries: Vec<String>,
    pub factory: FactorySpec,
    /// Interface of the pools the factory creates.
    pub pool_unit: String,
    pub oracle: InstanceSpec,
    pub investment_module: InstanceSpec,
    #[serde(default)]
    pub tokens: Vec<TokenSpec>,
    #[serde(default)]
    pub reward_modules: Option<RewardModulesSpec>,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub policy: PolicySpec,
    #[serde(default)]
    pub prices: Vec<PriceSpec>,
    #[serde(default = "default_backdate")]
    pub oracle_backdate_secs: u64,
    /// Unit of packed oracle timestamps; the backdate is converted to it.
    #[serde(default)]
    pub oracle_timestamp_unit: TimestampUnit,
    #[serde(default)]
    pub test_users: Vec<String>,
    #[serde(default)]
    pub mint: MintSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Sender account. Must match the local key when one is configured,
    /// otherwise the node's first account is used when unset.
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub receipt_poll: PollSpec,
    /// Submit the units of one wave concurrently.
    #[serde(default = "default_true")]
    pub concurrent_waves: bool,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            rpc_url: None,
            sender: None,
            chain_id: None,
            gas_limit: None,
            receipt_poll: PollSpec::default(),
            concurrent_waves: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSpec {
    pub retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PollSpec {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            retries: defaults.retries,
            initial_backoff_ms: defaults.initial_backoff.as_millis() as u64,
            max_backoff_ms: defaults.max_backoff.as_millis() as u64,
        }
    }
}

impl PollSpec {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.retries, self.initial_backoff_ms, self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorySpec {
    pub unit: String,
    #[serde(default = "default_create_method")]
    pub create_method: String,
    #[serde(default = "default_list_method")]
    pub list_method: String,
}

/// A contract deployed once under a fixed label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSpec {
    pub symbol: String,
    pub unit: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Constructor takes no `owner` argument.
    #[serde(default)]
    pub no_owner_arg: bool,
    /// Receives test-user mints.
    #[serde(default = "default_true")]
    pub mintable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardModulesSpec {
    pub unit: String,
    /// Symbol of the token rewards are paid in.
    pub reward_token: String,
    /// Annual rate as a decimal, scaled by `10^18`.
    #[serde(default = "default_apr")]
    pub apr: String,
    /// One module is deployed per listed token symbol.
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    pub principal: String,
    pub collaterals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSpec {
    /// Feed key such as `weth/usd`.
    pub key: String,
    /// Decimal price text.
    pub price: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintSpec {
    /// Whole-token amount minted to each test user, per token decimals.
    #[serde(default)]
    pub user_amount: Option<String>,
    /// Whole reward tokens minted to each reward module.
    #[serde(default)]
    pub reward_funding: Option<String>,
}

fn default_spec_version() -> u32 {
    SUPPORTED_SPEC_VERSION
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_backdate() -> u64 {
    DEFAULT_BACKDATE_SECS
}

fn default_true() -> bool {
    true
}

fn default_decimals() -> u8 {
    18
}

fn default_apr() -> String {
    "0.03".to_string()
}

fn default_create_method() -> String {
    "createLendingPool".to_string()
}

fn default_list_method() -> String {
    "poolAddresses".to_string()
}

impl DeploymentSpec {
    /// Load YAML (`.yaml`/`.yml`) or JSON, resolve `artifacts_dir` against the
    /// spec's directory, apply environment overrides and validate.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment spec {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut spec = if ext == "yaml" || ext == "yml" {
            serde_yaml::from_str::<Self>(&raw)
                .with_context(|| format!("Invalid YAML deployment spec in {}", path.display()))?
        } else {
            serde_json::from_str::<Self>(&raw)
                .with_context(|| format!("Invalid JSON deployment spec in {}", path.display()))?
        };

        if spec.artifacts_dir.is_relative() {
            if let Some(parent) = path.parent() {
                spec.artifacts_dir = parent.join(&spec.artifacts_dir);
            }
        }
        spec.apply_env_overrides();
        spec.validate()?;
        Ok(spec)
    }

    /// Environment values take precedence over the file:
    ///
    /// - `EVM_DEPLOY_RPC_URL` and `EVM_DEPLOY_SENDER`
    /// - `EVM_DEPLOY_CHAIN_ID` for `network.chain_id`
    /// - `EVM_DEPLOY_ORACLE_BACKDATE` for `oracle_backdate_secs`
    /// - `EVM_DEPLOY_SEQUENTIAL=1` turns off `network.concurrent_waves`
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_utils::env_string(env_utils::RPC_URL_ENV) {
            self.network.rpc_url = Some(url);
        }
        if let Some(sender) = env_utils::env_string(env_utils::SENDER_ENV) {
            self.network.sender = Some(sender);
        }
        if let Some(chain_id) = env_utils::env_var::<u64>(env_utils::CHAIN_ID_ENV) {
            self.network.chain_id = Some(chain_id);
        }
        if let Some(backdate) = env_utils::env_var::<u64>(env_utils::ORACLE_BACKDATE_ENV) {
            self.oracle_backdate_secs = backdate;
        }
        if env_utils::env_bool(env_utils::SEQUENTIAL_ENV) {
            self.network.concurrent_waves = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        self.collect_validation_issues(&mut issues);
        if issues.is_empty() {
            return Ok(());
        }

        let formatted = issues
            .into_iter()
            .enumerate()
            .map(|(idx, issue)| format!("  {}. {}", idx + 1, issue))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Deployment spec validation failed:\n{formatted}");
    }

    fn collect_validation_issues(&self, issues: &mut Vec<String>) {
        if self.version != SUPPORTED_SPEC_VERSION {
            issues.push(format!(
                "version {} is not supported (expected {})",
                self.version, SUPPORTED_SPEC_VERSION
            ));
        }

        for (idx, unit) in self.libraries.iter().enumerate() {
            validate_unit(&format!("libraries[{idx}]"), unit, issues);
        }
        validate_unit("factory.unit", &self.factory.unit, issues);
        validate_unit("pool_unit", &self.pool_unit, issues);
        validate_unit("oracle.unit", &self.oracle.unit, issues);
        validate_unit("investment_module.unit", &self.investment_module.unit, issues);

        if let Some(sender) = &self.network.sender {
            validate_address("network.sender", sender, issues);
        }
        if let Some(recipient) = &self.policy.protocol_fee_recipient {
            validate_address("policy.protocol_fee_recipient", recipient, issues);
        }
        for (idx, user) in self.test_users.iter().enumerate() {
            validate_address(&format!("test_users[{idx}]"), user, issues);
        }

        let mut symbols = HashSet::new();
        for (idx, token) in self.tokens.iter().enumerate() {
            if token.symbol.trim().is_empty() {
                issues.push(format!("tokens[{idx}] has an empty `symbol`"));
            } else if !symbols.insert(token.symbol.to_lowercase()) {
                issues.push(format!("duplicate token symbol `{}`", token.symbol));
            }
            validate_unit(&format!("tokens[{idx}].unit"), &token.unit, issues);
        }
        let known = |symbol: &str| symbols.contains(&symbol.to_lowercase());

        if let Some(rewards) = &self.reward_modules {
            validate_unit("reward_modules.unit", &rewards.unit, issues);
            if !known(&rewards.reward_token) {
                issues.push(format!(
                    "reward_modules.reward_token `{}` is not a declared token",
                    rewards.reward_token
                ));
            }
            for symbol in &rewards.symbols {
                if !known(symbol) {
                    issues.push(format!(
                        "reward_modules.symbols: `{}` is not a declared token",
                        symbol
                    ));
                }
            }
            if let Err(err) = parse_units(&rewards.apr, 18) {
                issues.push(format!("reward_modules.apr: {err}"));
            }
        }

        for (idx, pool) in self.pools.iter().enumerate() {
            if !known(&pool.principal) {
                issues.push(format!(
                    "pools[{idx}].principal `{}` is not a declared token",
                    pool.principal
                ));
            }
            for symbol in &pool.collaterals {
                if !known(symbol) {
                    issues.push(format!(
                        "pools[{idx}].collaterals: `{}` is not a declared token",
                        symbol
                    ));
                }
            }
        }

        issues.extend(self.policy.issues());

        for (idx, price) in self.prices.iter().enumerate() {
            if price.key.trim().is_empty() {
                issues.push(format!("prices[{idx}] has an empty `key`"));
            }
            if let Err(err) = price_mantissa(&price.price) {
                issues.push(format!("prices[{idx}]: {err}"));
            }
        }

        if let Some(amount) = &self.mint.user_amount {
            if let Err(err) = parse_units(amount, 0) {
                issues.push(format!("mint.user_amount: {err}"));
            }
        }
        if let Some(amount) = &self.mint.reward_funding {
            if let Err(err) = parse_units(amount, 0) {
                issues.push(format!("mint.reward_funding: {err}"));
            }
        }
    }

    /// Units deployed through linked waves: the libraries plus the factory.
    pub fn linked_units(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self
            .libraries
            .iter()
            .filter_map(|raw| UnitId::parse(raw))
            .collect();
        if let Some(factory) = UnitId::parse(&self.factory.unit) {
            if !units.contains(&factory) {
                units.push(factory);
            }
        }
        units
    }

    /// Price entries as `(key, price)` pairs, in file order.
    pub fn price_pairs(&self) -> Vec<(String, String)> {
        self.prices
            .iter()
            .map(|p| (p.key.clone(), p.price.clone()))
            .collect()
    }
}

fn validate_unit(field: &str, raw: &str, issues: &mut Vec<String>) {
    if UnitId::parse(raw).is_none() {
        issues.push(format!("{field}: `{raw}` is not a `path:Name` unit identity"));
    }
}

fn validate_address(field: &str, raw: &str, issues: &mut Vec<String>) {
    if parse_address(raw).is_none() {
        issues.push(format!("{field}: `{raw}` is not a 20-byte hex address"));
    }
}
