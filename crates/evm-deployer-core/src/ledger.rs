//! Persistent record of what a deployment has done so far.
//!
//! The ledger is what makes runs resumable: deployed units, labelled
//! instances, discovered pools, completed stages and completed batch entries
//! are all skipped on the next run. The core never loads it on its own; the
//! CLI passes it in and saves it after every stage.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use evm_deployer_types::UnitId;
use evm_linker::LinkMap;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::orchestrator::Stage;

/// Ledger file format version.
pub const LEDGER_VERSION: u32 = 1;

/// Ledger metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerMetadata {
    /// Creation timestamp
    pub created_at: Option<String>,
    /// Last modification timestamp
    pub last_modified: Option<String>,
    pub rpc_url: Option<String>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentLedger {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Addresses of units deployed through linked waves.
    #[serde(default)]
    pub links: LinkMap,
    /// Addresses of labelled deployments (`token:USDC`, `oracle`, ...).
    #[serde(default)]
    pub instances: BTreeMap<String, Address>,
    /// Pools discovered through the factory, in creation order.
    #[serde(default)]
    pub pools: Vec<Address>,
    #[serde(default)]
    pub completed_stages: BTreeSet<Stage>,
    /// Keys of batch entries that succeeded, for partially completed stages.
    #[serde(default)]
    pub completed_entries: BTreeSet<String>,
    #[serde(default)]
    pub metadata: LedgerMetadata,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

impl Default for DeploymentLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentLedger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION,
            links: LinkMap::new(),
            instances: BTreeMap::new(),
            pools: Vec::new(),
            completed_stages: BTreeSet::new(),
            completed_entries: BTreeSet::new(),
            metadata: LedgerMetadata {
                created_at: Some(chrono::Utc::now().to_rfc3339()),
                ..Default::default()
            },
        }
    }

    /// Load ledger from file or create new if not exists
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger {}", path.display()))?;
        let ledger: Self = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse ledger {}", path.display()))?;
        if ledger.version != LEDGER_VERSION {
            anyhow::bail!(
                "ledger {} has version {} (expected {})",
                path.display(),
                ledger.version,
                LEDGER_VERSION
            );
        }
        Ok(ledger)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut ledger = self.clone();
        ledger.metadata.last_modified = Some(chrono::Utc::now().to_rfc3339());

        let data = serde_json::to_string_pretty(&ledger).context("Failed to serialize ledger")?;
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write ledger {}", path.display()))?;
        Ok(())
    }

    pub fn record_unit(&mut self, unit: UnitId, address: Address) -> Result<(), DeployError> {
        self.links.record(unit, address)?;
        Ok(())
    }

    /// Labels are written once; a different address for a known label is rejected.
    pub fn record_instance(&mut self, label: &str, address: Address) -> Result<(), DeployError> {
        match self.instances.get(label) {
            Some(existing) if *existing != address => Err(DeployError::invalid(
                format!("instance {label}"),
                format!("already recorded at {existing}, refusing {address}"),
            )),
            Some(_) => Ok(()),
            None => {
                self.instances.insert(label.to_string(), address);
                Ok(())
            }
        }
    }

    pub fn instance(&self, label: &str) -> Option<Address> {
        self.instances.get(label).copied()
    }

    pub fn require_instance(&self, label: &str) -> Result<Address, DeployError> {
        self.instance(label).ok_or_else(|| DeployError::UnknownUnit {
            unit: label.to_string(),
        })
    }

    /// Address of a unit deployed through the linked waves.
    pub fn require_unit(&self, unit: &UnitId) -> Result<Address, DeployError> {
        self.links.get(unit).ok_or_else(|| DeployError::UnknownUnit {
            unit: unit.to_string(),
        })
    }

    pub fn is_stage_complete(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    pub fn mark_stage_complete(&mut self, stage: Stage) {
        self.completed_stages.insert(stage);
    }

    pub fn is_entry_done(&self, key: &str) -> bool {
        self.completed_entries.contains(key)
    }

    pub fn mark_entry_done(&mut self, key: &str) {
        self.completed_entries.insert(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deployments.json");

        let mut ledger = DeploymentLedger::load_or_create(&path).unwrap();
        assert!(ledger.instances.is_empty());
        ledger
            .record_unit(UnitId::new("contracts/libraries/PriceLib.sol", "PriceLib"), Address::repeat_byte(1))
            .unwrap();
        ledger.record_instance("token:USDC", Address::repeat_byte(2)).unwrap();
        ledger.pools.push(Address::repeat_byte(3));
        ledger.mark_stage_complete(Stage::Tokens);
        ledger.mark_entry_done("mint:USDC:0x01");
        ledger.save(&path).unwrap();

        let loaded = DeploymentLedger::load_or_create(&path).unwrap();
        assert_eq!(loaded.links.len(), 1);
        assert_eq!(loaded.instance("token:USDC"), Some(Address::repeat_byte(2)));
        assert_eq!(loaded.pools, vec![Address::repeat_byte(3)]);
        assert!(loaded.is_stage_complete(Stage::Tokens));
        assert!(!loaded.is_stage_complete(Stage::Mint));
        assert!(loaded.is_entry_done("mint:USDC:0x01"));
        assert!(loaded.metadata.last_modified.is_some());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"tokens\""));
    }

    #[test]
    fn test_instances_are_insert_only() {
        let mut ledger = DeploymentLedger::new();
        ledger.record_instance("oracle", Address::repeat_byte(1)).unwrap();
        ledger.record_instance("oracle", Address::repeat_byte(1)).unwrap();
        assert!(ledger.record_instance("oracle", Address::repeat_byte(2)).is_err());
        assert!(matches!(
            ledger.require_instance("missing"),
            Err(DeployError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deployments.json");
        std::fs::write(&path, r#"{"version": 9}"#).unwrap();
        assert!(DeploymentLedger::load(&path).is_err());
    }
}
