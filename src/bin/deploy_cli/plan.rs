//! Plan command - show deployment waves without submitting anything

use anyhow::Result;
use clap::Parser;

use evm_deployer::core::{compute_waves, ArtifactStore, DeploymentLedger, HardhatArtifactStore};

use super::output::{format_error, format_plan};
use super::CliContext;

#[derive(Parser, Debug)]
pub struct PlanCmd {
    /// Plan from scratch instead of against the state file
    #[arg(long)]
    pub fresh: bool,
}

impl PlanCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self.execute_inner(ctx) {
            Ok(text) => {
                print!("{}", text);
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, ctx.json));
                Err(e)
            }
        }
    }

    fn execute_inner(&self, ctx: &CliContext) -> Result<String> {
        let spec = ctx.load_spec()?;
        let store = HardhatArtifactStore::new(&spec.artifacts_dir);
        let units = store.load_all(&spec.linked_units())?;

        let ledger = if self.fresh || ctx.dry_run {
            DeploymentLedger::new()
        } else {
            DeploymentLedger::load_or_create(&ctx.state_file_path())?
        };
        let plan = compute_waves(&units, &ledger.links)?;
        let mut text = format_plan(&plan, ctx.json);
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}
