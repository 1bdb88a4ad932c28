//! Shared types for the evm-deployer workspace.
//!
//! This crate provides foundational types used across multiple crates in the workspace,
//! breaking circular dependency chains.
//!
//! ## Compiled Units
//!
//! The [`unit`] module contains the identity and payload of a compiled contract:
//! - [`UnitId`](unit::UnitId) - Fully-qualified `path:Name` identity
//! - [`Bytecode`](unit::Bytecode) - Hex bytecode that may still contain link placeholders
//! - [`CompiledUnit`](unit::CompiledUnit) - Identity + interface + bytecode
//!
//! The [`interface`] module parses ABI descriptors and derives canonical signatures.

pub mod env_utils;
pub mod interface;
pub mod unit;

// Re-export commonly used types at crate root
pub use interface::{AbiEntry, AbiParam, InterfaceDescriptor};
pub use unit::{Bytecode, CompiledUnit, UnitId};

use std::time::Duration;

/// Configuration for retry behavior on network operations.
#[derive(Debug, Copy, Clone)]
pub struct RetryConfig {
    /// Number of retry attempts.
    pub retries: usize,
    /// Initial backoff duration between retries.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Backoff to wait before the given (zero-based) attempt, doubling up to `max_backoff`.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16) as u32).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map(|d| d.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 60,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(5000),
        }
    }
}
