//! CLI subcommand implementations for evm-deploy

pub mod deploy;
pub mod link;
pub mod network;
pub mod output;
pub mod plan;
pub mod price;

use std::path::{Path, PathBuf};

use anyhow::Result;
use evm_deployer::core::DeploymentSpec;
use evm_deployer::types::env_utils;

/// Global flags shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub spec_path: PathBuf,
    pub state_file: Option<PathBuf>,
    pub rpc_url: Option<String>,
    pub sender: Option<String>,
    pub json: bool,
    pub verbose: bool,
    pub dry_run: bool,
}

impl CliContext {
    /// Load and validate the spec; command-line overrides win over file and environment.
    pub fn load_spec(&self) -> Result<DeploymentSpec> {
        let mut spec = DeploymentSpec::load_from_path(&self.spec_path)?;
        if let Some(url) = &self.rpc_url {
            spec.network.rpc_url = Some(url.clone());
        }
        if let Some(sender) = &self.sender {
            spec.network.sender = Some(sender.clone());
        }
        Ok(spec)
    }

    /// `--state-file`, then `EVM_DEPLOY_STATE_FILE`, then `deployments.json` beside the spec.
    pub fn state_file_path(&self) -> PathBuf {
        if let Some(path) = &self.state_file {
            return path.clone();
        }
        if let Some(path) = env_utils::env_string(env_utils::STATE_FILE_ENV) {
            return PathBuf::from(path);
        }
        self.spec_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("deployments.json")
    }
}
