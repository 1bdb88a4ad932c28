//! EVM Transport Layer
//!
//! Submission of deployments and contract calls to an EVM network.
//!
//! This crate provides:
//! - [`abi`]: Call-data encoding for constructor arguments and function calls
//! - [`submitter`]: The [`ChainSubmitter`] seam used by the orchestrator
//! - [`rpc`]: JSON-RPC submitter, node-managed or locally signed
//! - [`signer`]: EIP-1559 transaction signing with a private key
//! - [`local`]: In-memory chain for dry runs and tests
//!
//! # Example
//!
//! ```ignore
//! use evm_transport::{LocalChain, LocalSigner, RpcConfig, RpcSubmitter};
//!
//! // Real network, sender unlocked on the node
//! let rpc = RpcSubmitter::connect(RpcConfig::new("http://localhost:8545")).await?;
//!
//! // Public endpoint, signing locally
//! let mut config = RpcConfig::new("https://rpc.example.org");
//! config.signer = Some(LocalSigner::from_hex(&key)?);
//! let rpc = RpcSubmitter::connect(config).await?;
//!
//! // Deterministic in-memory chain
//! let local = LocalChain::new(sender);
//! ```

pub mod abi;
pub mod local;
pub mod rpc;
pub mod signer;
pub mod submitter;

// Re-export main types for convenience
pub use abi::{AbiError, AbiValue};
pub use local::{LocalCall, LocalChain, LocalDeployment};
pub use rpc::{RpcConfig, RpcSubmitter};
pub use signer::{Eip1559Transaction, LocalSigner};
pub use submitter::{CallRequest, ChainSubmitter, DeployRequest, Receipt, SubmissionFailure};
