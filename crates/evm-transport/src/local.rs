//! In-memory chain.
//!
//! Deterministic stand-in for a network: every deployment gets the address
//! `keccak256(sender ++ nonce)[12..]`, every call is recorded, and tests can
//! inject failures or stub read-only results. Backs `--dry-run`.

use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, U256};
use parking_lot::Mutex;
use tracing::debug;

use crate::abi::{self, AbiValue};
use crate::submitter::{CallRequest, ChainSubmitter, DeployRequest, Receipt, SubmissionFailure};

/// A contract created on the local chain.
#[derive(Debug, Clone)]
pub struct LocalDeployment {
    pub label: String,
    pub address: Address,
    pub init_code: Vec<u8>,
}

/// A confirmed state-changing call.
#[derive(Debug, Clone)]
pub struct LocalCall {
    pub to: Address,
    /// Function name.
    pub method: String,
    pub signature: String,
    pub args: Vec<AbiValue>,
}

#[derive(Debug, Clone)]
enum FailureRule {
    Deploy { label: String },
    Call { method: String, arg: Option<AbiValue> },
}

#[derive(Debug, Clone)]
struct Factory {
    create_method: String,
    list_method: String,
}

#[derive(Default)]
struct LocalState {
    nonce: u64,
    code: HashMap<Address, String>,
    deployments: Vec<LocalDeployment>,
    calls: Vec<LocalCall>,
    failures: Vec<FailureRule>,
    views: HashMap<(Address, Vec<u8>), Vec<u8>>,
    factories: Vec<Factory>,
    children: HashMap<Address, Vec<Address>>,
}

impl LocalState {
    fn next_address(&mut self, sender: Address) -> Address {
        let mut preimage = sender.to_vec();
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        self.nonce += 1;
        Address::from_slice(&keccak256(&preimage)[12..])
    }

    fn receipt(&self, payload: &[u8], contract_address: Option<Address>) -> Receipt {
        let mut preimage = payload.to_vec();
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        Receipt {
            tx_hash: format!("{:#x}", keccak256(&preimage)),
            block_number: Some(self.nonce),
            gas_used: None,
            contract_address,
        }
    }
}

/// Deterministic in-memory [`ChainSubmitter`].
pub struct LocalChain {
    sender: Address,
    state: Mutex<LocalState>,
}

impl LocalChain {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            state: Mutex::new(LocalState::default()),
        }
    }

    /// Treat `create_method` calls as child-contract creation and answer
    /// `list_method(uint256 index)` views with the created addresses.
    pub fn with_factory(self, create_method: &str, list_method: &str) -> Self {
        self.state.lock().factories.push(Factory {
            create_method: create_method.to_string(),
            list_method: list_method.to_string(),
        });
        self
    }

    /// Make the deployment labelled `label` fail.
    pub fn fail_deploy(&self, label: &str) {
        self.state.lock().failures.push(FailureRule::Deploy {
            label: label.to_string(),
        });
    }

    /// Make calls to `method` fail, optionally only those carrying `arg`.
    pub fn fail_call(&self, method: &str, arg: Option<AbiValue>) {
        self.state.lock().failures.push(FailureRule::Call {
            method: method.to_string(),
            arg,
        });
    }

    /// Fix the return data of a read-only call.
    pub fn stub_view(&self, request: &CallRequest, result: Vec<u8>) -> Result<(), SubmissionFailure> {
        let calldata = request.calldata()?;
        self.state.lock().views.insert((request.to, calldata), result);
        Ok(())
    }

    pub fn deployments(&self) -> Vec<LocalDeployment> {
        self.state.lock().deployments.clone()
    }

    pub fn calls(&self) -> Vec<LocalCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded calls to the function named `method`.
    pub fn calls_to(&self, method: &str) -> Vec<LocalCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.state.lock().code.contains_key(&address)
    }

    fn deploy_sync(&self, request: &DeployRequest) -> Result<Address, SubmissionFailure> {
        let init_code = request.init_code()?;
        let mut state = self.state.lock();
        let injected = state.failures.iter().any(|rule| {
            matches!(rule, FailureRule::Deploy { label } if label == &request.label)
        });
        if injected {
            return Err(SubmissionFailure::new(&request.label, "injected deployment failure"));
        }
        if init_code.is_empty() {
            return Err(SubmissionFailure::new(&request.label, "empty creation code"));
        }

        let address = state.next_address(self.sender);
        state.code.insert(address, request.label.clone());
        state.deployments.push(LocalDeployment {
            label: request.label.clone(),
            address,
            init_code,
        });
        debug!(label = %request.label, %address, "local deployment");
        Ok(address)
    }

    fn call_sync(&self, request: &CallRequest) -> Result<Receipt, SubmissionFailure> {
        let calldata = request.calldata()?;
        let (method, signature) = entry_names(request);
        let mut state = self.state.lock();

        if !state.code.contains_key(&request.to) {
            return Err(SubmissionFailure::new(
                request.label(),
                format!("no contract deployed at {}", request.to),
            ));
        }
        let injected = state.failures.iter().any(|rule| match rule {
            FailureRule::Call { method: m, arg } => {
                m == &method && arg.as_ref().map_or(true, |a| request.args.contains(a))
            }
            FailureRule::Deploy { .. } => false,
        });
        if injected {
            return Err(SubmissionFailure::new(request.label(), "execution reverted"));
        }

        let creates_child = state.factories.iter().any(|f| f.create_method == method);
        let mut created = None;
        if creates_child {
            let child = state.next_address(self.sender);
            state.code.insert(child, format!("{}:{}", request.to, method));
            state.children.entry(request.to).or_default().push(child);
            created = Some(child);
        } else {
            state.nonce += 1;
        }

        let receipt = state.receipt(&calldata, created);
        state.calls.push(LocalCall {
            to: request.to,
            method,
            signature,
            args: request.args.clone(),
        });
        Ok(receipt)
    }

    fn view_sync(&self, request: &CallRequest) -> Result<Vec<u8>, SubmissionFailure> {
        let calldata = request.calldata()?;
        let (method, _) = entry_names(request);
        let state = self.state.lock();

        if let Some(result) = state.views.get(&(request.to, calldata)) {
            return Ok(result.clone());
        }
        if state.factories.iter().any(|f| f.list_method == method) {
            let index = match request.args.first() {
                Some(AbiValue::Uint(i)) => *i,
                _ => U256::MAX,
            };
            let child = state
                .children
                .get(&request.to)
                .and_then(|list| usize::try_from(index).ok().and_then(|i| list.get(i)));
            return match child {
                Some(address) => Ok(abi::address_word(*address)),
                None => Err(SubmissionFailure::new(request.label(), "execution reverted")),
            };
        }
        Err(SubmissionFailure::new(
            request.label(),
            "no stubbed result for read-only call",
        ))
    }
}

/// Function name and signature as declared by the interface.
fn entry_names(request: &CallRequest) -> (String, String) {
    match request.interface.function(&request.method) {
        Some(entry) => (
            entry.name.clone().unwrap_or_default(),
            entry.signature().unwrap_or_default(),
        ),
        None => (request.method.clone(), request.method.clone()),
    }
}

#[async_trait::async_trait]
impl ChainSubmitter for LocalChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<Address, SubmissionFailure> {
        self.deploy_sync(request)
    }

    async fn call(&self, request: &CallRequest) -> Result<Receipt, SubmissionFailure> {
        self.call_sync(request)
    }

    async fn view(&self, request: &CallRequest) -> Result<Vec<u8>, SubmissionFailure> {
        self.view_sync(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm_deployer_types::{Bytecode, InterfaceDescriptor};

    fn token_request(label: &str) -> DeployRequest {
        DeployRequest::new(label, InterfaceDescriptor::default(), Bytecode::new("0x6080"))
    }

    fn factory_interface() -> InterfaceDescriptor {
        InterfaceDescriptor::from_fragments(&[
            "function createLendingPool()",
            "function poolAddresses(uint256) view",
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_addresses_are_deterministic() {
        let sender = Address::repeat_byte(0x42);
        let a = LocalChain::new(sender);
        let b = LocalChain::new(sender);
        let first = a.deploy(&token_request("A")).await.unwrap();
        assert_eq!(first, b.deploy(&token_request("A")).await.unwrap());
        let second = a.deploy(&token_request("B")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(a.deployments().len(), 2);
        assert!(a.has_code(second));
    }

    #[tokio::test]
    async fn test_injected_deploy_failure() {
        let chain = LocalChain::new(Address::ZERO);
        chain.fail_deploy("Broken");
        let err = chain.deploy(&token_request("Broken")).await.unwrap_err();
        assert_eq!(err.target, "Broken");
        assert!(chain.deploy(&token_request("Fine")).await.is_ok());
    }

    #[tokio::test]
    async fn test_call_requires_code() {
        let chain = LocalChain::new(Address::ZERO);
        let interface = InterfaceDescriptor::from_fragments(&["function mint(address,uint256)"]).unwrap();
        let request = CallRequest::new(
            Address::repeat_byte(9),
            interface,
            "mint",
            vec![AbiValue::Address(Address::ZERO), AbiValue::uint(1)],
        );
        let err = chain.call(&request).await.unwrap_err();
        assert!(err.cause.contains("no contract deployed"));
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_call_failure_filtered_by_argument() {
        let chain = LocalChain::new(Address::ZERO);
        let pool = chain.deploy(&token_request("Pool")).await.unwrap();
        let interface =
            InterfaceDescriptor::from_fragments(&["function setTokenRewardModule(address,address)"])
                .unwrap();
        let bad = Address::repeat_byte(1);
        chain.fail_call("setTokenRewardModule", Some(AbiValue::Address(bad)));

        let call = |token: Address| {
            CallRequest::new(
                pool,
                interface.clone(),
                "setTokenRewardModule",
                vec![AbiValue::Address(token), AbiValue::Address(Address::ZERO)],
            )
        };
        assert!(chain.call(&call(bad)).await.is_err());
        assert!(chain.call(&call(Address::repeat_byte(2))).await.is_ok());
        assert_eq!(chain.calls_to("setTokenRewardModule").len(), 1);
    }

    #[tokio::test]
    async fn test_factory_children_are_listed() {
        let chain = LocalChain::new(Address::ZERO).with_factory("createLendingPool", "poolAddresses");
        let factory = chain.deploy(&token_request("Factory")).await.unwrap();

        let create = CallRequest::new(factory, factory_interface(), "createLendingPool", vec![]);
        let receipt = chain.call(&create).await.unwrap();
        let child = receipt.contract_address.unwrap();

        let list = CallRequest::new(factory, factory_interface(), "poolAddresses", vec![AbiValue::uint(0)]);
        let data = chain.view(&list).await.unwrap();
        assert_eq!(abi::decode_address_word(&data), Some(child));
        assert!(chain.has_code(child));

        let missing = CallRequest::new(factory, factory_interface(), "poolAddresses", vec![AbiValue::uint(1)]);
        assert!(chain.view(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_stubbed_view() {
        let chain = LocalChain::new(Address::ZERO);
        let interface = InterfaceDescriptor::from_fragments(&["function decimals() view"]).unwrap();
        let request = CallRequest::new(Address::repeat_byte(3), interface, "decimals", vec![]);
        assert!(chain.view(&request).await.is_err());
        chain.stub_view(&request, vec![7]).unwrap();
        assert_eq!(chain.view(&request).await.unwrap(), vec![7]);
    }
}
