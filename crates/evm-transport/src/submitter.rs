//! The submission seam between the orchestrator and a network.

use std::fmt;

use alloy_primitives::Address;
use evm_deployer_types::{Bytecode, InterfaceDescriptor};
use serde::{Deserialize, Serialize};

use crate::abi::{self, AbiValue};

/// A contract creation: resolved bytecode plus constructor arguments.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Unit identity or instance label, used for logging and failure attribution.
    pub label: String,
    pub interface: InterfaceDescriptor,
    /// Must contain no placeholders.
    pub bytecode: Bytecode,
    pub constructor_args: Vec<AbiValue>,
}

impl DeployRequest {
    pub fn new(label: impl Into<String>, interface: InterfaceDescriptor, bytecode: Bytecode) -> Self {
        Self {
            label: label.into(),
            interface,
            bytecode,
            constructor_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<AbiValue>) -> Self {
        self.constructor_args = args;
        self
    }

    /// Creation code followed by the encoded constructor arguments.
    pub fn init_code(&self) -> Result<Vec<u8>, SubmissionFailure> {
        let mut code = self
            .bytecode
            .to_bytes()
            .map_err(|e| SubmissionFailure::new(&self.label, format!("bytecode is not hex: {e}")))?;
        let args = abi::encode_constructor(&self.interface, &self.constructor_args)
            .map_err(|e| SubmissionFailure::new(&self.label, e.to_string()))?;
        code.extend(args);
        Ok(code)
    }
}

/// A function call against a deployed contract.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub to: Address,
    pub interface: InterfaceDescriptor,
    /// Bare name or full signature.
    pub method: String,
    pub args: Vec<AbiValue>,
}

impl CallRequest {
    pub fn new(
        to: Address,
        interface: InterfaceDescriptor,
        method: impl Into<String>,
        args: Vec<AbiValue>,
    ) -> Self {
        Self {
            to,
            interface,
            method: method.into(),
            args,
        }
    }

    /// `method@0x...`, used in logs and failures.
    pub fn label(&self) -> String {
        format!("{}@{}", self.method, self.to)
    }

    pub fn calldata(&self) -> Result<Vec<u8>, SubmissionFailure> {
        abi::encode_call(&self.interface, &self.method, &self.args)
            .map_err(|e| SubmissionFailure::new(self.label(), e.to_string()))
    }
}

/// Outcome of a confirmed state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub contract_address: Option<Address>,
}

/// The network rejected or failed a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    /// Deploy label or call label the failure belongs to.
    pub target: String,
    pub cause: String,
}

impl SubmissionFailure {
    pub fn new(target: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "submission of {} failed: {}", self.target, self.cause)
    }
}

impl std::error::Error for SubmissionFailure {}

/// Submits deployments and calls to a network.
///
/// Each operation suspends until the network confirms or rejects it.
/// Implementations serialise nonces themselves; callers may issue
/// concurrent requests.
#[async_trait::async_trait]
pub trait ChainSubmitter: Send + Sync {
    /// The account transactions are sent from.
    fn sender(&self) -> Address;

    async fn deploy(&self, request: &DeployRequest) -> Result<Address, SubmissionFailure>;

    async fn call(&self, request: &CallRequest) -> Result<Receipt, SubmissionFailure>;

    /// Read-only call; returns the raw return data.
    async fn view(&self, request: &CallRequest) -> Result<Vec<u8>, SubmissionFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_code_appends_constructor_args() {
        let interface = InterfaceDescriptor::from_json(&serde_json::json!([
            {"type": "constructor", "inputs": [{"name": "owner", "type": "address"}]}
        ]))
        .unwrap();
        let request = DeployRequest::new("MockToken", interface, Bytecode::new("0x6080"))
            .with_args(vec![AbiValue::Address(Address::repeat_byte(1))]);
        let code = request.init_code().unwrap();
        assert_eq!(code.len(), 2 + 32);
        assert_eq!(&code[..2], &[0x60, 0x80]);
    }

    #[test]
    fn test_init_code_rejects_placeholder_text() {
        let request = DeployRequest::new(
            "Pool",
            InterfaceDescriptor::default(),
            Bytecode::new("0x60__$aa$__"),
        );
        let err = request.init_code().unwrap_err();
        assert_eq!(err.target, "Pool");
    }

    #[test]
    fn test_calldata_failure_is_attributed() {
        let request = CallRequest::new(
            Address::ZERO,
            InterfaceDescriptor::default(),
            "mint",
            Vec::new(),
        );
        let err = request.calldata().unwrap_err();
        assert!(err.target.starts_with("mint@"));
        assert!(err.to_string().contains("no function 'mint'"));
    }
}
