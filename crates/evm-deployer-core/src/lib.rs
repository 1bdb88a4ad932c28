//! EVM Deployer Core
//!
//! Linking, sequencing and configuration engine for deploying a lending
//! protocol made of many interdependent contracts.
//!
//! # Core Modules
//!
//! - [`sequencer`]: Dependency graph and deployment waves
//! - [`oracle`]: Packed oracle price encoding
//! - [`params`]: Pool initialization records
//! - [`registry`]: Symbol to address lookup
//! - [`orchestrator`]: Stage driver over a [`ChainSubmitter`](evm_transport::ChainSubmitter)
//!
//! # Supporting Modules
//!
//! - [`artifacts`]: Loading compiled units from a Hardhat artifact tree
//! - [`config`]: The YAML/JSON deployment spec
//! - [`ledger`]: Persistent record of a deployment, used to resume
//! - [`fixed_point`]: Decimal text to scaled integers
//! - [`errors`]: [`DeployError`]
//!
//! # Example
//!
//! ```ignore
//! use evm_deployer_core::{DeploymentLedger, DeploymentSpec, HardhatArtifactStore, Orchestrator, Stage};
//! use evm_transport::LocalChain;
//!
//! let spec = DeploymentSpec::load_from_path(path)?;
//! let store = HardhatArtifactStore::new(&spec.artifacts_dir);
//! let mut orch = Orchestrator::new(LocalChain::new(sender), Box::new(store), DeploymentLedger::new());
//! for stage in Stage::ALL {
//!     let report = orch.run_stage(&spec, stage).await?;
//! }
//! ```

#![allow(clippy::result_large_err)]
#![allow(clippy::too_many_arguments)]

pub mod artifacts;
pub mod config;
pub mod errors;
pub mod fixed_point;
pub mod ledger;
pub mod oracle;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod sequencer;

pub use artifacts::{parse_artifact, ArtifactStore, HardhatArtifactStore, MemoryArtifactStore};
pub use config::DeploymentSpec;
pub use errors::DeployError;
pub use ledger::DeploymentLedger;
pub use oracle::{
    build_price_batch, decode_price, encode_price, oracle_timestamp, PriceBatch, TimestampUnit,
};
pub use orchestrator::{BatchReport, EntryStatus, Orchestrator, Stage};
pub use params::{build_pool_init_param, PolicySpec, PoolInitParam};
pub use registry::{RewardModuleRegistry, TokenEntry, TokenRegistry};
pub use sequencer::{compute_waves, WavePlan};
