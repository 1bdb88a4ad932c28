//! Symbol-keyed registries of deployed tokens and reward modules.
//!
//! Built once from the deployment spec and ledger, then read-only. Lookups
//! ignore case; the only failure is [`DeployError::UnknownSymbol`].

use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::Serialize;

use crate::errors::DeployError;

/// Oracle feed key for a token: `lowercase(symbol)/usd`.
pub fn feed_key(symbol: &str) -> String {
    format!("{}/usd", symbol.to_lowercase())
}

/// Case-insensitive symbol map.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Registry<T> {
    by_symbol: BTreeMap<String, T>,
}

impl<T> Registry<T> {
    /// Fails on a symbol that appears twice, ignoring case.
    pub fn new(entries: impl IntoIterator<Item = (String, T)>) -> Result<Self, DeployError> {
        let mut by_symbol = BTreeMap::new();
        for (symbol, value) in entries {
            let key = symbol.to_lowercase();
            if by_symbol.insert(key, value).is_some() {
                return Err(DeployError::invalid(
                    "registry",
                    format!("symbol '{}' registered twice", symbol),
                ));
            }
        }
        Ok(Self { by_symbol })
    }

    pub fn get(&self, symbol: &str) -> Result<&T, DeployError> {
        self.by_symbol
            .get(&symbol.to_lowercase())
            .ok_or_else(|| DeployError::unknown_symbol(symbol))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(&symbol.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Entries keyed by lowercased symbol.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.by_symbol.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A deployed ERC-20.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenEntry {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

pub type TokenRegistry = Registry<TokenEntry>;

/// Token symbol to reward module address.
pub type RewardModuleRegistry = Registry<Address>;

impl Registry<TokenEntry> {
    pub fn from_tokens(tokens: impl IntoIterator<Item = TokenEntry>) -> Result<Self, DeployError> {
        Self::new(tokens.into_iter().map(|t| (t.symbol.clone(), t)))
    }

    pub fn address(&self, symbol: &str) -> Result<Address, DeployError> {
        self.get(symbol).map(|t| t.address)
    }

    /// Feed key of a registered token.
    pub fn feed_key(&self, symbol: &str) -> Result<String, DeployError> {
        self.get(symbol).map(|t| feed_key(&t.symbol))
    }
}
