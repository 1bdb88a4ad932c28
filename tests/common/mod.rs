#![allow(dead_code)]
//! Shared test utilities for CLI integration tests.
//!
//! - `fixtures`: A hardhat-style project (artifacts plus spec) in a temp dir

pub mod fixtures;

pub use fixtures::{evm_deploy, Project};
