//! Compiled artifact loading.
//!
//! Artifacts are produced by an external build step; this module only reads
//! them. The on-disk layout is the hardhat one:
//! `<root>/<source path>/<Name>.json` holding `contractName`, `sourceName`,
//! `abi`, `bytecode` and optionally `linkReferences`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use evm_deployer_types::{Bytecode, CompiledUnit, InterfaceDescriptor, UnitId};
use evm_linker::{find_placeholders, placeholder_for};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::DeployError;

/// Read-only source of compiled units, keyed by `path:Name`.
pub trait ArtifactStore: Send + Sync {
    fn load(&self, unit: &UnitId) -> Result<CompiledUnit, DeployError>;

    fn load_all(&self, units: &[UnitId]) -> Result<Vec<CompiledUnit>, DeployError> {
        units.iter().map(|u| self.load(u)).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    abi: Value,
    bytecode: String,
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Artifacts laid out by hardhat under an `artifacts/` directory.
#[derive(Debug, Clone)]
pub struct HardhatArtifactStore {
    root: PathBuf,
}

impl HardhatArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, unit: &UnitId) -> PathBuf {
        self.root
            .join(unit.source_path())
            .join(format!("{}.json", unit.name()))
    }
}

impl ArtifactStore for HardhatArtifactStore {
    fn load(&self, unit: &UnitId) -> Result<CompiledUnit, DeployError> {
        let path = self.artifact_path(unit);
        let raw = std::fs::read_to_string(&path).map_err(|e| DeployError::Artifact {
            unit: unit.to_string(),
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let compiled = parse_artifact(unit, &raw)?;
        debug!(unit = %unit, path = %path.display(), "loaded artifact");
        Ok(compiled)
    }
}

/// Parse a hardhat artifact and check it against the requested identity.
pub fn parse_artifact(unit: &UnitId, raw: &str) -> Result<CompiledUnit, DeployError> {
    let fail = |message: String| DeployError::Artifact {
        unit: unit.to_string(),
        message,
    };

    let artifact: HardhatArtifact =
        serde_json::from_str(raw).map_err(|e| fail(format!("malformed artifact: {e}")))?;
    if artifact.source_name != unit.source_path() || artifact.contract_name != unit.name() {
        return Err(fail(format!(
            "artifact describes {}:{}",
            artifact.source_name, artifact.contract_name
        )));
    }

    let interface = InterfaceDescriptor::from_json(&artifact.abi)
        .map_err(|e| fail(format!("malformed abi: {e}")))?;
    let bytecode = Bytecode::new(artifact.bytecode);

    let mut references = Vec::new();
    for (source, names) in &artifact.link_references {
        for name in names.keys() {
            references.push(UnitId::new(source, name));
        }
    }

    if !references.is_empty() {
        let found = find_placeholders(&bytecode);
        let found: Vec<_> = found.iter().map(|t| t.normalized()).collect();
        let declared: Vec<_> = references.iter().map(placeholder_for).collect();
        if let Some(missing) = references
            .iter()
            .zip(&declared)
            .find(|(_, token)| !found.contains(token))
        {
            return Err(fail(format!(
                "declares link reference {} but bytecode has no placeholder for it",
                missing.0
            )));
        }
        if let Some(extra) = found.iter().find(|t| !declared.contains(t)) {
            return Err(fail(format!(
                "bytecode placeholder {} is not a declared link reference",
                extra
            )));
        }
    }

    Ok(CompiledUnit::new(unit.clone(), interface, bytecode).with_link_references(references))
}

/// Map-backed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    units: HashMap<UnitId, CompiledUnit>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: CompiledUnit) {
        self.units.insert(unit.id.clone(), unit);
    }

    pub fn with(mut self, unit: CompiledUnit) -> Self {
        self.insert(unit);
        self
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self, unit: &UnitId) -> Result<CompiledUnit, DeployError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| DeployError::Artifact {
                unit: unit.to_string(),
                message: "not in store".to_string(),
            })
    }
}
