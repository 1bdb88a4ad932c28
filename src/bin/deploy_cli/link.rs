//! Link command - resolve one unit against the recorded libraries

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use evm_deployer::core::{ArtifactStore, DeploymentLedger, HardhatArtifactStore};
use evm_deployer::linker::{placeholder_for, resolve};
use evm_deployer::types::UnitId;

use super::output::format_error;
use super::CliContext;

#[derive(Parser, Debug)]
pub struct LinkCmd {
    /// Unit to link, as `path/File.sol:Name`
    pub unit: String,

    /// Write the linked bytecode to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct LinkJson {
    unit: String,
    bytecode_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytecode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

impl LinkCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        self.execute_inner(ctx).inspect_err(|e| eprintln!("{}", format_error(e, ctx.json)))
    }

    fn execute_inner(&self, ctx: &CliContext) -> Result<()> {
        let Some(unit) = UnitId::parse(&self.unit) else {
            bail!("invalid unit `{}`, expected `path/File.sol:Name`", self.unit);
        };
        let spec = ctx.load_spec()?;
        let store = HardhatArtifactStore::new(&spec.artifacts_dir);
        let compiled = store.load(&unit)?;
        let ledger = if ctx.dry_run {
            DeploymentLedger::new()
        } else {
            DeploymentLedger::load_or_create(&ctx.state_file_path())?
        };

        let linked = match resolve(&compiled.bytecode, &ledger.links) {
            Ok(code) => code,
            Err(unresolved) => {
                // Name the libraries we know about
                let known = spec.linked_units();
                let names: Vec<String> = unresolved
                    .placeholders
                    .iter()
                    .map(|token| {
                        known
                            .iter()
                            .find(|lib| placeholder_for(lib) == token.normalized())
                            .map(|lib| format!("{} ({})", token, lib))
                            .unwrap_or_else(|| token.to_string())
                    })
                    .collect();
                bail!(
                    "{} still references undeployed libraries: {}",
                    unit,
                    names.join(", ")
                );
            }
        };

        if let Some(path) = &self.output {
            std::fs::write(path, linked.as_str())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        if ctx.json {
            let json = LinkJson {
                unit: unit.to_string(),
                bytecode_len: linked.body().len() / 2,
                bytecode: self.output.is_none().then(|| linked.as_str().to_string()),
                output: self.output.as_ref().map(|p| p.display().to_string()),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else if let Some(path) = &self.output {
            println!("Linked {} -> {}", unit, path.display());
        } else {
            println!("{}", linked.as_str());
        }
        Ok(())
    }
}
