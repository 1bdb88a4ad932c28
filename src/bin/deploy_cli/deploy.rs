//! Deploy command - run stages and persist progress after each one

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{debug, info};

use evm_deployer::core::{
    BatchReport, DeploymentLedger, DeploymentSpec, HardhatArtifactStore, Orchestrator, Stage,
};
use evm_deployer::transport::ChainSubmitter;

use super::network;
use super::output::{format_error, format_report, format_reports_json};
use super::CliContext;

#[derive(Parser, Debug)]
pub struct DeployCmd {
    /// Run only this stage (repeatable); all stages run by default
    #[arg(long = "stage", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Submit the units of a wave one at a time
    #[arg(long)]
    pub sequential: bool,
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    s.parse()
}

/// Reports of the stages that ran, plus what stopped the run.
struct DeployOutcome {
    reports: Vec<BatchReport>,
    error: Option<anyhow::Error>,
}

impl DeployCmd {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let outcome = match self.execute_inner(ctx).await {
            Ok(outcome) => outcome,
            Err(e) => DeployOutcome {
                reports: Vec::new(),
                error: Some(e),
            },
        };

        if ctx.json {
            println!("{}", format_reports_json(&outcome.reports, outcome.error.as_ref()));
        }
        match outcome.error {
            Some(e) => {
                if !ctx.json {
                    eprintln!("{}", format_error(&e, false));
                }
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn selected_stages(&self) -> Vec<Stage> {
        if self.stages.is_empty() {
            return Stage::ALL.to_vec();
        }
        let mut stages = self.stages.clone();
        stages.sort();
        stages.dedup();
        stages
    }

    async fn execute_inner(&self, ctx: &CliContext) -> Result<DeployOutcome> {
        let spec = ctx.load_spec()?;
        let stages = self.selected_stages();
        let store = Box::new(HardhatArtifactStore::new(&spec.artifacts_dir));
        let concurrent = spec.network.concurrent_waves && !self.sequential;

        if ctx.dry_run {
            let chain = network::dry_run_chain(&spec)?;
            let orch = Orchestrator::new(chain, store, DeploymentLedger::new())
                .with_concurrent_waves(concurrent);
            return Ok(run_stages(orch, &spec, &stages, None, ctx).await);
        }

        let state_file = ctx.state_file_path();
        let mut ledger = DeploymentLedger::load_or_create(&state_file)?;
        let submitter = network::connect(&spec).await?;
        let chain_id = submitter.chain_id().await?;
        if let Some(recorded) = ledger.metadata.chain_id {
            if recorded != chain_id {
                return Err(anyhow!(
                    "state file {} was recorded on chain {}, but the node reports chain {}",
                    state_file.display(),
                    recorded,
                    chain_id
                ));
            }
        }
        info!(chain_id, state_file = %state_file.display(), "connected");
        ledger.metadata.chain_id = Some(chain_id);
        ledger.metadata.rpc_url = spec.network.rpc_url.clone();

        let orch = Orchestrator::new(submitter, store, ledger).with_concurrent_waves(concurrent);
        Ok(run_stages(orch, &spec, &stages, Some(&state_file), ctx).await)
    }
}

/// Run `stages` in order, saving the ledger after each one.
///
/// Stops at the first stage that aborts or leaves failed entries.
async fn run_stages<S: ChainSubmitter>(
    mut orch: Orchestrator<S>,
    spec: &DeploymentSpec,
    stages: &[Stage],
    state_file: Option<&Path>,
    ctx: &CliContext,
) -> DeployOutcome {
    let mut reports = Vec::new();
    for &stage in stages {
        let result = orch.run_stage(spec, stage).await;

        if let Some(path) = state_file {
            debug!(stage = %stage, path = %path.display(), "saving state file");
            if let Err(e) = orch.ledger().save(path) {
                return DeployOutcome {
                    reports,
                    error: Some(e.context("Failed to save state file")),
                };
            }
        }

        let report = match result.with_context(|| format!("stage {} aborted", stage)) {
            Ok(report) => report,
            Err(e) => {
                return DeployOutcome {
                    reports,
                    error: Some(e),
                }
            }
        };
        if !ctx.json {
            print!("{}", format_report(&report, ctx.verbose));
        }

        let failed = report.failures().count();
        info!(stage = %stage, entries = report.entries.len(), failed, "stage finished");
        reports.push(report);
        if failed > 0 {
            return DeployOutcome {
                reports,
                error: Some(anyhow!(
                    "stage {} finished with {} failed entr{}; re-run to retry them",
                    stage,
                    failed,
                    if failed == 1 { "y" } else { "ies" }
                )),
            };
        }
    }
    DeployOutcome {
        reports,
        error: None,
    }
}
