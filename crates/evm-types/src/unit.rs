//! Compiled unit identity and payload.
//!
//! A compiled unit is what the compiler toolchain hands us: a fully-qualified
//! identity (`contracts/libraries/Borrow.sol:Borrow`), an ABI descriptor and
//! creation bytecode that may still carry library link placeholders.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::interface::InterfaceDescriptor;

/// Fully-qualified `source/path.sol:ContractName` identity of a compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Build an identity from a source path and contract name.
    pub fn new(source_path: &str, name: &str) -> Self {
        Self(format!("{}:{}", source_path.trim(), name.trim()))
    }

    /// Parse a `path:Name` identity. The contract name is everything after the last `:`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (path, name) = raw.rsplit_once(':')?;
        if path.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Source file part of the identity (`contracts/libraries/Borrow.sol`).
    pub fn source_path(&self) -> &str {
        self.0.rsplit_once(':').map(|(path, _)| path).unwrap_or("")
    }

    /// Contract name part of the identity (`Borrow`).
    pub fn name(&self) -> &str {
        self.0.rsplit_once(':').map(|(_, name)| name).unwrap_or(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded creation bytecode, possibly containing `__$...$__` placeholders.
///
/// Stored as text because placeholders are not valid hex and must survive
/// until linking replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bytecode(String);

impl Bytecode {
    pub fn new(hex_text: impl Into<String>) -> Self {
        Self(hex_text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex body without the `0x` prefix.
    pub fn body(&self) -> &str {
        self.0
            .strip_prefix("0x")
            .or_else(|| self.0.strip_prefix("0X"))
            .unwrap_or(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.body().is_empty()
    }

    /// Decode to raw bytes. Fails while placeholders remain.
    pub fn to_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.body())
    }
}

impl From<&[u8]> for Bytecode {
    fn from(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }
}

/// A compiled contract or library as loaded from the artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub id: UnitId,
    pub interface: InterfaceDescriptor,
    pub bytecode: Bytecode,
    /// Library identities declared by the compiler's link references.
    pub link_references: Vec<UnitId>,
}

impl CompiledUnit {
    pub fn new(id: UnitId, interface: InterfaceDescriptor, bytecode: Bytecode) -> Self {
        Self {
            id,
            interface,
            bytecode,
            link_references: Vec::new(),
        }
    }

    pub fn with_link_references(mut self, refs: Vec<UnitId>) -> Self {
        self.link_references = refs;
        self
    }
}
