//! EVM Deployer
//!
//! Deploys a lending protocol made of many interdependent contracts to an
//! EVM network:
//!
//! - **Linking**: Splice deployed library addresses into bytecode placeholders
//! - **Sequencing**: Group units into waves whose dependencies are all deployed
//! - **Configuration**: Encode pool parameters and packed oracle prices
//! - **Orchestration**: Run resumable stages against a JSON-RPC node or an in-memory chain
//!
//! See [`core`] for the engine and [`transport`] for network submission.

pub use evm_deployer_core as core;
pub use evm_deployer_types as types;
pub use evm_linker as linker;
pub use evm_transport as transport;
