use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use evm_deployer::core::DeploymentSpec;
use evm_deployer::linker::parse_address;
use evm_deployer::transport::{LocalChain, LocalSigner, RpcConfig, RpcSubmitter};
use evm_deployer::types::env_utils::{env_string, PRIVATE_KEY_ENV};

/// Sender of dry runs when neither the spec nor a key names one.
fn dry_run_sender() -> Address {
    Address::repeat_byte(0x01)
}

pub fn configured_sender(spec: &DeploymentSpec) -> Result<Option<Address>> {
    spec.network
        .sender
        .as_deref()
        .map(|raw| parse_address(raw).ok_or_else(|| anyhow!("invalid sender address `{}`", raw)))
        .transpose()
}

/// Parse the local signing key, if one was given.
fn signer_from(raw: Option<String>) -> Result<Option<LocalSigner>> {
    raw.map(|key| LocalSigner::from_hex(&key).with_context(|| format!("invalid {}", PRIVATE_KEY_ENV)))
        .transpose()
}

/// The key from `EVM_DEPLOY_PRIVATE_KEY`; transactions are signed locally when set.
pub fn local_signer() -> Result<Option<LocalSigner>> {
    signer_from(env_string(PRIVATE_KEY_ENV))
}

pub fn rpc_config(spec: &DeploymentSpec) -> Result<RpcConfig> {
    let url = spec.network.rpc_url.as_deref().ok_or_else(|| {
        anyhow!("no RPC endpoint: pass --rpc-url, set EVM_DEPLOY_RPC_URL or network.rpc_url")
    })?;
    let mut config = RpcConfig::new(url);
    config.sender = configured_sender(spec)?;
    config.signer = local_signer()?;
    config.chain_id = spec.network.chain_id;
    config.gas_limit = spec.network.gas_limit;
    config.receipt_polling = spec.network.receipt_poll.retry_config();
    Ok(config)
}

pub async fn connect(spec: &DeploymentSpec) -> Result<RpcSubmitter> {
    let config = rpc_config(spec)?;
    let url = config.url.clone();
    RpcSubmitter::connect(config)
        .await
        .with_context(|| format!("Failed to connect to {}", url))
}

/// In-memory chain that emulates the pool factory.
pub fn dry_run_chain(spec: &DeploymentSpec) -> Result<LocalChain> {
    let signer = local_signer()?.map(|signer| signer.address());
    let sender = configured_sender(spec)?.or(signer).unwrap_or_else(dry_run_sender);
    Ok(LocalChain::new(sender).with_factory(&spec.factory.create_method, &spec.factory.list_method))
}
