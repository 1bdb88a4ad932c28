//! Stage-based deployment driver.
//!
//! The [`Orchestrator`] owns a [`ChainSubmitter`], an [`ArtifactStore`] and
//! the [`DeploymentLedger`]. Library deployment goes through wave planning
//! and linking; the remaining stages deploy labelled instances and issue
//! configuration calls. Everything already recorded in the ledger is skipped,
//! so a stage can be re-run after a partial failure.
//!
//! Structural errors (unresolved references, cycles, conflicting records)
//! abort immediately. Per-entry failures in batch stages are isolated and
//! reported in a [`BatchReport`]; a stage with failures is not marked complete.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use evm_deployer_types::{CompiledUnit, InterfaceDescriptor, UnitId};
use evm_linker::{parse_address, resolve};
use evm_transport::abi::decode_address_word;
use evm_transport::{AbiValue, CallRequest, ChainSubmitter, DeployRequest, SubmissionFailure};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactStore;
use crate::config::DeploymentSpec;
use crate::errors::DeployError;
use crate::fixed_point::parse_units;
use crate::ledger::DeploymentLedger;
use crate::oracle::{build_price_batch, TimestampUnit};
use crate::params::build_pool_init_param;
use crate::registry::{RewardModuleRegistry, TokenEntry, TokenRegistry};
use crate::sequencer::compute_waves;

/// Deployment stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Tokens,
    Libraries,
    Oracle,
    Rewards,
    Pools,
    Initialize,
    RewardWiring,
    Prices,
    Mint,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Tokens,
        Stage::Libraries,
        Stage::Oracle,
        Stage::Rewards,
        Stage::Pools,
        Stage::Initialize,
        Stage::RewardWiring,
        Stage::Prices,
        Stage::Mint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Tokens => "tokens",
            Stage::Libraries => "libraries",
            Stage::Oracle => "oracle",
            Stage::Rewards => "rewards",
            Stage::Pools => "pools",
            Stage::Initialize => "initialize",
            Stage::RewardWiring => "reward_wiring",
            Stage::Prices => "prices",
            Stage::Mint => "mint",
        }
    }

    /// Stages that resubmit on every run and are never recorded as complete.
    pub fn is_repeatable(self) -> bool {
        matches!(self, Stage::Prices)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown stage '{}' (expected one of {})", s, names.join(", "))
            })
    }
}

/// Outcome of one batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum EntryStatus {
    Done,
    /// Already recorded by an earlier run.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub key: String,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// Per-entry outcomes of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub stage: Stage,
    pub entries: Vec<EntryOutcome>,
}

impl BatchReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, key: impl Into<String>, status: EntryStatus) {
        self.entries.push(EntryOutcome {
            key: key.into(),
            status,
        });
    }

    pub fn done(&mut self, key: impl Into<String>) {
        self.push(key, EntryStatus::Done);
    }

    pub fn skipped(&mut self, key: impl Into<String>) {
        self.push(key, EntryStatus::Skipped);
    }

    pub fn failed(&mut self, key: impl Into<String>, error: &dyn fmt::Display) {
        let key = key.into();
        warn!(stage = %self.stage, entry = %key, error = %error, "batch entry failed");
        self.push(key, EntryStatus::Failed(error.to_string()));
    }

    pub fn count(&self, status: &EntryStatus) -> usize {
        self.entries
            .iter()
            .filter(|e| std::mem::discriminant(&e.status) == std::mem::discriminant(status))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.status, EntryStatus::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|e| match &e.status {
            EntryStatus::Failed(reason) => Some((e.key.as_str(), reason.as_str())),
            _ => None,
        })
    }
}

/// Result of [`Orchestrator::deploy_linked`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkedDeployment {
    /// Confirmed deployments in submission order, grouped by wave.
    pub waves: Vec<Vec<(UnitId, Address)>>,
    pub already_deployed: Vec<UnitId>,
}

pub fn token_label(symbol: &str) -> String {
    format!("token:{}", symbol)
}

pub fn reward_label(symbol: &str) -> String {
    format!("rewards:{}", symbol)
}

pub const ORACLE_LABEL: &str = "oracle";
pub const INVESTMENT_LABEL: &str = "investment_module";

fn parse_unit(raw: &str) -> Result<UnitId, DeployError> {
    UnitId::parse(raw).ok_or_else(|| DeployError::invalid("unit", format!("`{raw}` is not path:Name")))
}

/// Drives a deployment against one submitter.
pub struct Orchestrator<S: ChainSubmitter> {
    submitter: S,
    store: Box<dyn ArtifactStore>,
    ledger: DeploymentLedger,
    concurrent_waves: bool,
    fixed_now: Option<u64>,
    units: HashMap<UnitId, CompiledUnit>,
}

impl<S: ChainSubmitter> Orchestrator<S> {
    pub fn new(submitter: S, store: Box<dyn ArtifactStore>, ledger: DeploymentLedger) -> Self {
        Self {
            submitter,
            store,
            ledger,
            concurrent_waves: true,
            fixed_now: None,
            units: HashMap::new(),
        }
    }

    /// Submit the units of a wave concurrently (default) or one at a time.
    pub fn with_concurrent_waves(mut self, concurrent: bool) -> Self {
        self.concurrent_waves = concurrent;
        self
    }

    /// Use a fixed unix time for oracle timestamps instead of the clock.
    pub fn with_fixed_time(mut self, now_unix: u64) -> Self {
        self.fixed_now = Some(now_unix);
        self
    }

    pub fn ledger(&self) -> &DeploymentLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> DeploymentLedger {
        self.ledger
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    fn now_in(&self, unit: TimestampUnit) -> u64 {
        match self.fixed_now {
            Some(secs) => unit.from_secs(secs),
            None => unit.now(),
        }
    }

    fn unit(&mut self, raw: &str) -> Result<CompiledUnit, DeployError> {
        let id = parse_unit(raw)?;
        if let Some(unit) = self.units.get(&id) {
            return Ok(unit.clone());
        }
        let unit = self.store.load(&id)?;
        self.units.insert(id, unit.clone());
        Ok(unit)
    }

    fn interface(&mut self, raw: &str) -> Result<InterfaceDescriptor, DeployError> {
        Ok(self.unit(raw)?.interface)
    }

    /// Deploy `units` wave by wave, recording every confirmed address.
    ///
    /// Refuses to start while any unit is blocked. Every unit of a wave is
    /// linked before any of them is submitted. A failed wave halts the run
    /// after the units of that wave that did confirm are recorded.
    pub async fn deploy_linked(
        &mut self,
        units: &[CompiledUnit],
    ) -> Result<LinkedDeployment, DeployError> {
        let plan = compute_waves(units, &self.ledger.links)?;
        if let Some(blocked) = plan.blocked.first() {
            return Err(DeployError::UnresolvedReference {
                unit: blocked.unit.clone(),
                placeholders: blocked.missing.clone(),
            });
        }
        let by_id: HashMap<&UnitId, &CompiledUnit> = units.iter().map(|u| (&u.id, u)).collect();
        let mut summary = LinkedDeployment {
            already_deployed: plan.already_deployed.clone(),
            ..LinkedDeployment::default()
        };

        for (index, wave) in plan.waves.iter().enumerate() {
            info!(wave = index, units = wave.len(), "deploying wave");

            let mut requests = Vec::with_capacity(wave.len());
            for id in wave {
                let unit = by_id.get(id).ok_or_else(|| DeployError::UnknownUnit {
                    unit: id.to_string(),
                })?;
                let code = resolve(&unit.bytecode, &self.ledger.links).map_err(|e| {
                    DeployError::UnresolvedReference {
                        unit: id.clone(),
                        placeholders: e.placeholders,
                    }
                })?;
                debug!(unit = %id, "linked");
                requests.push(DeployRequest::new(id.as_str(), unit.interface.clone(), code));
            }

            let results: Vec<Result<Address, SubmissionFailure>> = if self.concurrent_waves {
                join_all(requests.iter().map(|r| self.submitter.deploy(r))).await
            } else {
                let mut results = Vec::with_capacity(requests.len());
                for request in &requests {
                    results.push(self.submitter.deploy(request).await);
                }
                results
            };

            let mut confirmed = Vec::new();
            let mut first_failure = None;
            for (id, result) in wave.iter().zip(results) {
                match result {
                    Ok(address) => {
                        self.ledger.record_unit(id.clone(), address)?;
                        info!(unit = %id, %address, "recorded");
                        confirmed.push((id.clone(), address));
                    }
                    Err(failure) => {
                        warn!(unit = %id, error = %failure, "deployment failed");
                        first_failure.get_or_insert(failure);
                    }
                }
            }
            summary.waves.push(confirmed);
            if let Some(failure) = first_failure {
                return Err(failure.into());
            }
        }
        Ok(summary)
    }

    /// Deploy one labelled instance, or return its recorded address.
    pub async fn deploy_instance(
        &mut self,
        label: &str,
        unit: &CompiledUnit,
        constructor_args: Vec<AbiValue>,
    ) -> Result<Address, DeployError> {
        if let Some(existing) = self.ledger.instance(label) {
            debug!(label, %existing, "instance already deployed");
            return Ok(existing);
        }
        let code = resolve(&unit.bytecode, &self.ledger.links).map_err(|e| {
            DeployError::UnresolvedReference {
                unit: unit.id.clone(),
                placeholders: e.placeholders,
            }
        })?;
        let request =
            DeployRequest::new(label, unit.interface.clone(), code).with_args(constructor_args);
        let address = self.submitter.deploy(&request).await?;
        self.ledger.record_instance(label, address)?;
        info!(label, unit = %unit.id, %address, "instance deployed");
        Ok(address)
    }

    /// Deploy an instance as a batch entry; structural errors still abort.
    async fn instance_entry(
        &mut self,
        report: &mut BatchReport,
        label: &str,
        unit_raw: &str,
        args: Vec<AbiValue>,
    ) -> Result<(), DeployError> {
        if self.ledger.instance(label).is_some() {
            report.skipped(label);
            return Ok(());
        }
        let unit = match self.unit(unit_raw) {
            Ok(unit) => unit,
            Err(err) if err.is_structural() => return Err(err),
            Err(err) => {
                report.failed(label, &err);
                return Ok(());
            }
        };
        match self.deploy_instance(label, &unit, args).await {
            Ok(_) => report.done(label),
            Err(err) if err.is_structural() => return Err(err),
            Err(err) => report.failed(label, &err),
        }
        Ok(())
    }

    /// Issue one configuration call as a batch entry keyed by `key`.
    async fn call_entry(&mut self, report: &mut BatchReport, key: &str, request: CallRequest) {
        if self.ledger.is_entry_done(key) {
            report.skipped(key);
            return;
        }
        match self.submitter.call(&request).await {
            Ok(receipt) => {
                debug!(entry = key, tx = %receipt.tx_hash, "call confirmed");
                self.ledger.mark_entry_done(key);
                report.done(key);
            }
            Err(failure) => report.failed(key, &failure),
        }
    }

    /// Tokens recorded in the ledger, keyed by symbol.
    pub fn token_registry(&self, spec: &DeploymentSpec) -> Result<TokenRegistry, DeployError> {
        TokenRegistry::from_tokens(spec.tokens.iter().filter_map(|token| {
            self.ledger
                .instance(&token_label(&token.symbol))
                .map(|address| TokenEntry {
                    symbol: token.symbol.clone(),
                    address,
                    decimals: token.decimals,
                })
        }))
    }

    /// Reward modules recorded in the ledger, keyed by token symbol.
    pub fn reward_registry(&self, spec: &DeploymentSpec) -> Result<RewardModuleRegistry, DeployError> {
        let symbols = spec
            .reward_modules
            .as_ref()
            .map(|r| r.symbols.clone())
            .unwrap_or_default();
        RewardModuleRegistry::new(symbols.into_iter().filter_map(|symbol| {
            self.ledger
                .instance(&reward_label(&symbol))
                .map(|address| (symbol, address))
        }))
    }

    /// Run one stage, marking it complete in the ledger when no entry failed.
    ///
    /// Repeatable stages (prices) run every time and are never marked complete.
    pub async fn run_stage(
        &mut self,
        spec: &DeploymentSpec,
        stage: Stage,
    ) -> Result<BatchReport, DeployError> {
        let mut report = BatchReport::new(stage);
        if !stage.is_repeatable() && self.ledger.is_stage_complete(stage) {
            report.skipped(stage.as_str());
            return Ok(report);
        }

        info!(%stage, "stage started");
        match stage {
            Stage::Tokens => self.stage_tokens(spec, &mut report).await?,
            Stage::Libraries => self.stage_libraries(spec, &mut report).await?,
            Stage::Oracle => self.stage_oracle(spec, &mut report).await?,
            Stage::Rewards => self.stage_rewards(spec, &mut report).await?,
            Stage::Pools => self.stage_pools(spec, &mut report).await?,
            Stage::Initialize => self.stage_initialize(spec, &mut report).await?,
            Stage::RewardWiring => self.stage_reward_wiring(spec, &mut report).await?,
            Stage::Prices => self.stage_prices(spec, &mut report).await?,
            Stage::Mint => self.stage_mint(spec, &mut report).await?,
        }

        if !report.has_failures() && !stage.is_repeatable() {
            self.ledger.mark_stage_complete(stage);
        }
        info!(
            %stage,
            done = report.count(&EntryStatus::Done),
            skipped = report.count(&EntryStatus::Skipped),
            failed = report.count(&EntryStatus::Failed(String::new())),
            "stage finished"
        );
        Ok(report)
    }

    async fn stage_tokens(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let owner = self.submitter.sender();
        for token in &spec.tokens {
            let args = if token.no_owner_arg {
                Vec::new()
            } else {
                vec![AbiValue::Address(owner)]
            };
            self.instance_entry(report, &token_label(&token.symbol), &token.unit, args)
                .await?;
        }
        Ok(())
    }

    async fn stage_libraries(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let mut units = Vec::new();
        for id in spec.linked_units() {
            units.push(self.unit(id.as_str())?);
        }
        let summary = self.deploy_linked(&units).await?;
        for id in &summary.already_deployed {
            report.skipped(id.as_str());
        }
        for (id, _) in summary.waves.iter().flatten() {
            report.done(id.as_str());
        }
        Ok(())
    }

    async fn stage_oracle(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        self.instance_entry(report, ORACLE_LABEL, &spec.oracle.unit, Vec::new())
            .await?;
        self.instance_entry(report, INVESTMENT_LABEL, &spec.investment_module.unit, Vec::new())
            .await
    }

    async fn stage_rewards(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let Some(rewards) = &spec.reward_modules else {
            return Ok(());
        };
        let tokens = self.token_registry(spec)?;
        let apr = parse_units(&rewards.apr, 18)?;
        for symbol in &rewards.symbols {
            let label = reward_label(symbol);
            let addresses = tokens
                .address(symbol)
                .and_then(|token| Ok((token, tokens.address(&rewards.reward_token)?)));
            match addresses {
                Ok((token, reward_token)) => {
                    let args = vec![
                        AbiValue::Address(token),
                        AbiValue::Address(reward_token),
                        AbiValue::Uint(apr),
                    ];
                    self.instance_entry(report, &label, &rewards.unit, args).await?;
                }
                Err(err) => report.failed(label, &err),
            }
        }
        Ok(())
    }

    async fn stage_pools(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let factory_id = parse_unit(&spec.factory.unit)?;
        let factory = self.ledger.require_unit(&factory_id)?;
        let interface = self.interface(&spec.factory.unit)?;

        let mut created = 0;
        for index in 0..spec.pools.len() {
            let key = format!("pools:create:{index}");
            if self.ledger.is_entry_done(&key) {
                report.skipped(key);
                created += 1;
                continue;
            }
            let request = CallRequest::new(factory, interface.clone(), &spec.factory.create_method, Vec::new());
            self.call_entry(report, &key, request).await;
            if !self.ledger.is_entry_done(&key) {
                // Later pools would get shifted indices; stop here.
                break;
            }
            created += 1;
        }

        for index in self.ledger.pools.len()..created {
            let key = format!("pools:discover:{index}");
            let request = CallRequest::new(
                factory,
                interface.clone(),
                &spec.factory.list_method,
                vec![AbiValue::Uint(U256::from(index))],
            );
            match self.submitter.view(&request).await {
                Ok(data) => match decode_address_word(&data) {
                    Some(pool) => {
                        info!(index, %pool, "pool discovered");
                        self.ledger.pools.push(pool);
                        report.done(key);
                    }
                    None => {
                        report.failed(key, &"return data is not an address");
                        break;
                    }
                },
                Err(failure) => {
                    report.failed(key, &failure);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn stage_initialize(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let oracle = self.ledger.require_instance(ORACLE_LABEL)?;
        let invest = self.ledger.require_instance(INVESTMENT_LABEL)?;
        let recipient = match &spec.policy.protocol_fee_recipient {
            Some(raw) => parse_address(raw)
                .ok_or_else(|| DeployError::invalid("policy.protocol_fee_recipient", raw.clone()))?,
            None => self.submitter.sender(),
        };
        let config = spec.policy.to_static(oracle, invest, recipient)?;
        let tokens = self.token_registry(spec)?;
        let interface = self.interface(&spec.pool_unit)?;

        for (index, pool_spec) in spec.pools.iter().enumerate() {
            let key = format!("initialize:{index}");
            let Some(pool) = self.ledger.pools.get(index).copied() else {
                report.failed(key, &DeployError::UnknownUnit { unit: format!("pool #{index}") });
                continue;
            };
            match build_pool_init_param(&pool_spec.collaterals, &pool_spec.principal, &tokens, &config) {
                Ok(param) => {
                    let request = CallRequest::new(pool, interface.clone(), "initialize", vec![param.to_abi_value()]);
                    self.call_entry(report, &key, request).await;
                }
                Err(err) => report.failed(key, &err),
            }
        }
        Ok(())
    }

    async fn stage_reward_wiring(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let tokens = self.token_registry(spec)?;
        let modules = self.reward_registry(spec)?;
        let interface = self.interface(&spec.pool_unit)?;

        for (index, pool_spec) in spec.pools.iter().enumerate() {
            for symbol in &pool_spec.collaterals {
                let key = format!("reward_wiring:{index}:{}", symbol.to_lowercase());
                let Some(pool) = self.ledger.pools.get(index).copied() else {
                    report.failed(key, &DeployError::UnknownUnit { unit: format!("pool #{index}") });
                    continue;
                };
                let resolved = tokens
                    .address(symbol)
                    .and_then(|token| Ok((token, *modules.get(symbol)?)));
                match resolved {
                    Ok((token, module)) => {
                        let request = CallRequest::new(
                            pool,
                            interface.clone(),
                            "setTokenRewardModule",
                            vec![AbiValue::Address(token), AbiValue::Address(module)],
                        );
                        self.call_entry(report, &key, request).await;
                    }
                    Err(err) => report.failed(key, &err),
                }
            }
        }
        Ok(())
    }

    async fn stage_prices(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        if spec.prices.is_empty() {
            return Ok(());
        }
        let oracle = self.ledger.require_instance(ORACLE_LABEL)?;
        let interface = self.interface(&spec.oracle.unit)?;
        let unit = spec.oracle_timestamp_unit;
        let batch = build_price_batch(
            &spec.price_pairs(),
            self.now_in(unit),
            unit.from_secs(spec.oracle_backdate_secs),
        );
        for (key, err) in &batch.failures {
            report.failed(format!("price:{key}"), err);
        }
        if batch.entries.is_empty() {
            return Ok(());
        }
        let request = CallRequest::new(oracle, interface, "setMultipleValues", batch.to_call_args());
        match self.submitter.call(&request).await {
            Ok(_) => {
                for entry in &batch.entries {
                    report.done(format!("price:{}", entry.key));
                }
            }
            Err(failure) => report.failed("prices", &failure),
        }
        Ok(())
    }

    async fn stage_mint(&mut self, spec: &DeploymentSpec, report: &mut BatchReport) -> Result<(), DeployError> {
        let tokens = self.token_registry(spec)?;

        if let Some(amount) = &spec.mint.user_amount {
            for user_raw in &spec.test_users {
                let user = parse_address(user_raw)
                    .ok_or_else(|| DeployError::invalid("test user", user_raw.clone()))?;
                for token in spec.tokens.iter().filter(|t| t.mintable) {
                    let key = format!("mint:{}:{:#x}", token.symbol, user);
                    self.mint_entry(report, &key, &tokens, &token.symbol, &token.unit, user, amount)
                        .await?;
                }
            }
        }

        if let (Some(amount), Some(rewards)) = (&spec.mint.reward_funding, &spec.reward_modules) {
            let modules = self.reward_registry(spec)?;
            let Some(reward_token) = spec
                .tokens
                .iter()
                .find(|t| t.symbol.eq_ignore_ascii_case(&rewards.reward_token))
            else {
                report.failed("fund", &DeployError::unknown_symbol(&rewards.reward_token));
                return Ok(());
            };
            for symbol in &rewards.symbols {
                let key = format!("fund:{}", symbol);
                match modules.get(symbol) {
                    Ok(module) => {
                        let module = *module;
                        self.mint_entry(
                            report,
                            &key,
                            &tokens,
                            &reward_token.symbol,
                            &reward_token.unit,
                            module,
                            amount,
                        )
                        .await?;
                    }
                    Err(err) => report.failed(key, &err),
                }
            }
        }
        Ok(())
    }

    async fn mint_entry(
        &mut self,
        report: &mut BatchReport,
        key: &str,
        tokens: &TokenRegistry,
        symbol: &str,
        unit_raw: &str,
        to: Address,
        whole_amount: &str,
    ) -> Result<(), DeployError> {
        let token = match tokens.get(symbol) {
            Ok(token) => token.clone(),
            Err(err) => {
                report.failed(key, &err);
                return Ok(());
            }
        };
        let prepared = parse_units(whole_amount, u32::from(token.decimals))
            .and_then(|amount| Ok((amount, self.interface(unit_raw)?)));
        let (amount, interface) = match prepared {
            Ok(prepared) => prepared,
            Err(err) if err.is_structural() => return Err(err),
            Err(err) => {
                report.failed(key, &err);
                return Ok(());
            }
        };
        let request = CallRequest::new(
            token.address,
            interface,
            "mint",
            vec![AbiValue::Address(to), AbiValue::Uint(amount)],
        );
        self.call_entry(report, key, request).await;
        Ok(())
    }
}
