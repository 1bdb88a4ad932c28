//! JSON-RPC submitter.
//!
//! With a [`LocalSigner`] configured, transactions are signed here as EIP-1559
//! envelopes and sent with `eth_sendRawTransaction`; nonces are tracked
//! locally so a wave can be submitted concurrently. Without one, they go out
//! through `eth_sendTransaction` from an account the node manages (a dev node
//! or an unlocked account). Blocking HTTP calls run on the tokio blocking pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use anyhow::{anyhow, Context, Result};
use evm_deployer_types::RetryConfig;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::signer::{Eip1559Transaction, LocalSigner};
use crate::submitter::{CallRequest, ChainSubmitter, DeployRequest, Receipt, SubmissionFailure};

/// Connection settings for [`RpcSubmitter`].
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Sender account; the node's first account when unset.
    pub sender: Option<Address>,
    /// Expected chain id; checked on connect when set.
    pub chain_id: Option<u64>,
    pub gas_limit: Option<u64>,
    pub timeout: Duration,
    /// Receipt polling schedule.
    pub receipt_polling: RetryConfig,
    /// Sign locally instead of relying on the node's accounts.
    pub signer: Option<LocalSigner>,
}

impl RpcConfig {
    /// Default request timeout in seconds.
    const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            sender: None,
            chain_id: None,
            gas_limit: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            receipt_polling: RetryConfig::default(),
            signer: None,
        }
    }
}

/// Fallback tip when the node has no `eth_maxPriorityFeePerGas`.
const DEFAULT_PRIORITY_FEE_WEI: u64 = 1_000_000_000;

/// Submits over HTTP JSON-RPC.
pub struct RpcSubmitter {
    url: String,
    agent: ureq::Agent,
    sender: Address,
    gas_limit: Option<u64>,
    polling: RetryConfig,
    next_id: AtomicU64,
    chain_id: u64,
    signer: Option<LocalSigner>,
    /// Next nonce for locally signed transactions; refetched after a failed send.
    nonce: Mutex<Option<u64>>,
}

impl RpcSubmitter {
    /// Connect, resolve the sender account and verify the chain id.
    pub async fn connect(config: RpcConfig) -> Result<Self> {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        let mut submitter = Self {
            url: config.url.clone(),
            agent,
            sender: Address::ZERO,
            gas_limit: config.gas_limit,
            polling: config.receipt_polling,
            next_id: AtomicU64::new(1),
            chain_id: 0,
            signer: config.signer.clone(),
            nonce: Mutex::new(None),
        };

        let chain_id = submitter
            .chain_id()
            .await
            .with_context(|| format!("failed to query chain id from {}", config.url))?;
        if let Some(expected) = config.chain_id {
            if expected != chain_id {
                return Err(anyhow!(
                    "chain id mismatch: node reports {}, deployment expects {}",
                    chain_id,
                    expected
                ));
            }
        }

        submitter.chain_id = chain_id;

        submitter.sender = match (&config.signer, config.sender) {
            (Some(signer), Some(sender)) if signer.address() != sender => {
                return Err(anyhow!(
                    "sender {:#x} does not match the signing key's address {:#x}",
                    sender,
                    signer.address()
                ));
            }
            (Some(signer), _) => signer.address(),
            (None, Some(sender)) => sender,
            (None, None) => submitter.first_account().await?,
        };
        info!(
            url = %config.url,
            chain_id,
            sender = %submitter.sender,
            local_signing = submitter.signer.is_some(),
            "connected to rpc node"
        );
        Ok(submitter)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let value = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&value).ok_or_else(|| anyhow!("malformed eth_chainId result: {}", value))
    }

    async fn first_account(&self) -> Result<Address> {
        let accounts = self.request("eth_accounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<Address>().ok())
            .ok_or_else(|| anyhow!("node exposes no accounts; pass --sender"))
    }

    /// Execute one JSON-RPC request.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let agent = self.agent.clone();
        let url = self.url.clone();
        let method_name = method.to_string();

        let response: Value = tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .set("Content-Type", "application/json")
                .send_json(&body)
                .map_err(|e| anyhow!("{} request failed: {}", method_name, e))?
                .into_json::<Value>()
                .map_err(|e| anyhow!("failed to parse {} response: {}", method_name, e))
        })
        .await
        .context("rpc worker panicked")??;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(anyhow!("{} error: {}", method, message));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("no result in {} response", method))
    }

    fn transaction(&self, to: Option<Address>, data: &[u8]) -> Value {
        let mut tx = json!({
            "from": format!("{:#x}", self.sender),
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(to) = to {
            tx["to"] = json!(format!("{:#x}", to));
        }
        if let Some(gas) = self.gas_limit {
            tx["gas"] = json!(format!("0x{:x}", gas));
        }
        tx
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256> {
        let value = self.request(method, params).await?;
        value
            .as_str()
            .and_then(|raw| U256::from_str_radix(raw.trim_start_matches("0x"), 16).ok())
            .ok_or_else(|| anyhow!("malformed {} result: {}", method, value))
    }

    /// Gas, fees and nonce for a locally signed transaction.
    async fn fill_transaction(&self, to: Option<Address>, data: &[u8], nonce: u64) -> Result<Eip1559Transaction> {
        let gas_limit = match self.gas_limit {
            Some(gas) => gas,
            None => {
                let estimate = self
                    .quantity("eth_estimateGas", json!([self.transaction(to, data)]))
                    .await?;
                u64::try_from(estimate).map_err(|_| anyhow!("gas estimate {} out of range", estimate))?
            }
        };
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let priority = match self.quantity("eth_maxPriorityFeePerGas", json!([])).await {
            Ok(tip) => tip,
            Err(e) => {
                debug!(error = %e, "using default priority fee");
                U256::from(DEFAULT_PRIORITY_FEE_WEI)
            }
        };
        Ok(Eip1559Transaction {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: priority,
            max_fee_per_gas: gas_price.saturating_add(priority),
            gas_limit,
            to,
            value: U256::ZERO,
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Sign with the local key and broadcast, returning the transaction hash.
    async fn send_signed(&self, signer: &LocalSigner, to: Option<Address>, data: &[u8]) -> Result<Value> {
        let mut next = self.nonce.lock().await;
        let nonce = match *next {
            Some(nonce) => nonce,
            None => {
                let pending = self
                    .quantity("eth_getTransactionCount", json!([format!("{:#x}", self.sender), "pending"]))
                    .await?;
                u64::try_from(pending).map_err(|_| anyhow!("nonce {} out of range", pending))?
            }
        };
        let sent = async {
            let tx = self.fill_transaction(to, data, nonce).await?;
            let raw = signer.sign_transaction(&tx)?;
            self.request("eth_sendRawTransaction", json!([format!("0x{}", hex::encode(raw))]))
                .await
        }
        .await;
        match &sent {
            Ok(_) => *next = Some(nonce + 1),
            Err(e) => {
                warn!(nonce, error = %e, "signed send failed; nonce will be refetched");
                *next = None;
            }
        }
        sent
    }

    /// Send and wait for a successful receipt.
    async fn send_and_confirm(
        &self,
        target: &str,
        to: Option<Address>,
        data: &[u8],
    ) -> Result<Receipt, SubmissionFailure> {
        let sent = match &self.signer {
            Some(signer) => self.send_signed(signer, to, data).await,
            None => {
                self.request("eth_sendTransaction", json!([self.transaction(to, data)]))
                    .await
            }
        };
        let hash = sent.map_err(|e| SubmissionFailure::new(target, e.to_string()))?;
        let hash = hash
            .as_str()
            .ok_or_else(|| SubmissionFailure::new(target, "send returned no transaction hash"))?
            .to_string();
        debug!(label = target, tx = %hash, "transaction sent");

        for attempt in 0..=self.polling.retries {
            let receipt = self
                .request("eth_getTransactionReceipt", json!([hash]))
                .await
                .map_err(|e| SubmissionFailure::new(target, e.to_string()))?;
            if !receipt.is_null() {
                return receipt_from_json(target, &hash, &receipt);
            }
            tokio::time::sleep(self.polling.backoff_for(attempt)).await;
        }
        Err(SubmissionFailure::new(
            target,
            format!("no receipt for {} after {} polls", hash, self.polling.retries + 1),
        ))
    }
}

fn parse_quantity(value: &Value) -> Option<u64> {
    let raw = value.as_str()?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

fn receipt_from_json(target: &str, hash: &str, receipt: &Value) -> Result<Receipt, SubmissionFailure> {
    let status = receipt.get("status").and_then(parse_quantity);
    if status == Some(0) {
        return Err(SubmissionFailure::new(
            target,
            format!("transaction {} reverted", hash),
        ));
    }
    Ok(Receipt {
        tx_hash: hash.to_string(),
        block_number: receipt.get("blockNumber").and_then(parse_quantity),
        gas_used: receipt.get("gasUsed").and_then(parse_quantity),
        contract_address: receipt
            .get("contractAddress")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<Address>().ok()),
    })
}

#[async_trait::async_trait]
impl ChainSubmitter for RpcSubmitter {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<Address, SubmissionFailure> {
        let code = request.init_code()?;
        let receipt = self
            .send_and_confirm(&request.label, None, &code)
            .await?;
        receipt.contract_address.ok_or_else(|| {
            SubmissionFailure::new(&request.label, "receipt carries no contract address")
        })
    }

    async fn call(&self, request: &CallRequest) -> Result<Receipt, SubmissionFailure> {
        let data = request.calldata()?;
        let label = request.label();
        self.send_and_confirm(&label, Some(request.to), &data)
            .await
    }

    async fn view(&self, request: &CallRequest) -> Result<Vec<u8>, SubmissionFailure> {
        let data = request.calldata()?;
        let label = request.label();
        let result = self
            .request("eth_call", json!([self.transaction(Some(request.to), &data), "latest"]))
            .await
            .map_err(|e| SubmissionFailure::new(&label, e.to_string()))?;
        let raw = result
            .as_str()
            .ok_or_else(|| SubmissionFailure::new(&label, "eth_call returned no data"))?;
        hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| SubmissionFailure::new(&label, format!("malformed return data: {e}")))
    }
}
