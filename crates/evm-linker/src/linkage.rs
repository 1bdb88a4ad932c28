//! Link map handling and bytecode resolution.
//!
//! The [`LinkMap`] records where each library identity was deployed. It only
//! ever grows during a run: once an address is recorded it is immutable.
//! [`resolve`] splices those addresses into bytecode and refuses to hand back
//! bytecode that still carries placeholders.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use alloy_primitives::Address;
use evm_deployer_types::{Bytecode, UnitId};
use serde::{Deserialize, Serialize};

use crate::address::address_hex_body;
use crate::placeholder::{find_placeholders, placeholder_for, PlaceholderToken};

/// Library identity -> deployed address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkMap {
    entries: BTreeMap<UnitId, Address>,
}

/// Attempt to overwrite an address already recorded in a [`LinkMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConflict {
    pub library: UnitId,
    pub existing: Address,
    pub attempted: Address,
}

impl fmt::Display for LinkConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "library {} is already linked at {}, refusing to record {}",
            self.library, self.existing, self.attempted
        )
    }
}

impl std::error::Error for LinkConflict {}

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deployed library address.
    ///
    /// Re-recording the same address is a no-op; a different address is a conflict.
    pub fn record(&mut self, library: UnitId, address: Address) -> Result<(), LinkConflict> {
        match self.entries.get(&library) {
            Some(existing) if *existing == address => Ok(()),
            Some(existing) => Err(LinkConflict {
                library,
                existing: *existing,
                attempted: address,
            }),
            None => {
                self.entries.insert(library, address);
                Ok(())
            }
        }
    }

    pub fn get(&self, library: &UnitId) -> Option<Address> {
        self.entries.get(library).copied()
    }

    pub fn contains(&self, library: &UnitId) -> bool {
        self.entries.contains_key(library)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &Address)> {
        self.entries.iter()
    }

    /// Find the recorded library whose placeholder is `token`.
    pub fn library_for_token(&self, token: &PlaceholderToken) -> Option<(&UnitId, Address)> {
        let wanted = token.normalized();
        self.entries
            .iter()
            .find(|(id, _)| placeholder_for(id) == wanted)
            .map(|(id, addr)| (id, *addr))
    }

    fn token_index(&self) -> HashMap<PlaceholderToken, Address> {
        self.entries
            .iter()
            .map(|(id, addr)| (placeholder_for(id), *addr))
            .collect()
    }
}

/// Placeholders left in bytecode after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub placeholders: Vec<PlaceholderToken>,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens = self
            .placeholders
            .iter()
            .map(PlaceholderToken::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{} unresolved library placeholder(s): {}",
            self.placeholders.len(),
            tokens
        )
    }
}

impl std::error::Error for UnresolvedReference {}

/// Replace every placeholder whose library is in `links` with its address.
///
/// Fails, listing every remaining token, if any placeholder is left afterwards.
/// Resolving already-linked bytecode returns it unchanged.
pub fn resolve(code: &Bytecode, links: &LinkMap) -> Result<Bytecode, UnresolvedReference> {
    let found = find_placeholders(code);
    if found.is_empty() {
        return Ok(code.clone());
    }

    let index = links.token_index();
    let mut text = code.as_str().to_string();
    let mut missing = Vec::new();

    for token in found {
        match index.get(&token.normalized()) {
            Some(address) => {
                text = text.replace(token.as_str(), &address_hex_body(address));
            }
            None => missing.push(token),
        }
    }

    if !missing.is_empty() {
        return Err(UnresolvedReference {
            placeholders: missing,
        });
    }

    Ok(Bytecode::new(text))
}
