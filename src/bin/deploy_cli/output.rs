//! Output formatting for evm-deploy CLI
//!
//! Provides human-readable and JSON output formatting for all commands.

use serde::Serialize;
use std::path::Path;

use evm_deployer::core::orchestrator::EntryStatus;
use evm_deployer::core::{BatchReport, DeploymentLedger, Stage, WavePlan};

/// Format a stage report for display
pub fn format_report(report: &BatchReport, verbose: bool) -> String {
    let done = report.count(&EntryStatus::Done);
    let skipped = report.count(&EntryStatus::Skipped);
    let failed = report.count(&EntryStatus::Failed(String::new()));

    let mut out = if failed == 0 {
        format!(
            "\x1b[32m✓ {}\x1b[0m: {} done, {} skipped\n",
            report.stage, done, skipped
        )
    } else {
        format!(
            "\x1b[31m✗ {}\x1b[0m: {} done, {} skipped, {} failed\n",
            report.stage, done, skipped, failed
        )
    };

    for entry in &report.entries {
        match &entry.status {
            EntryStatus::Failed(reason) => {
                out.push_str(&format!("  \x1b[31m✗\x1b[0m {}: {}\n", entry.key, reason));
            }
            EntryStatus::Done if verbose => {
                out.push_str(&format!("  \x1b[32m✓\x1b[0m {}\n", entry.key));
            }
            EntryStatus::Skipped if verbose => {
                out.push_str(&format!("  \x1b[33m-\x1b[0m {} (already done)\n", entry.key));
            }
            _ => {}
        }
    }
    out
}

pub fn format_reports_json(reports: &[BatchReport], error: Option<&anyhow::Error>) -> String {
    #[derive(Serialize)]
    struct DeployJson<'a> {
        success: bool,
        stages: &'a [BatchReport],
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    }

    let json = DeployJson {
        success: error.is_none(),
        stages: reports,
        error: error.map(|e| format!("{:#}", e)),
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}

/// Format a wave plan for display
pub fn format_plan(plan: &WavePlan, json_output: bool) -> String {
    if json_output {
        return serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string());
    }

    let mut out = String::new();
    if !plan.already_deployed.is_empty() {
        out.push_str("\x1b[1mAlready deployed:\x1b[0m\n");
        for unit in &plan.already_deployed {
            out.push_str(&format!("  {}\n", unit));
        }
        out.push('\n');
    }
    for (index, wave) in plan.waves.iter().enumerate() {
        out.push_str(&format!("\x1b[1mWave {}:\x1b[0m\n", index));
        for unit in wave {
            out.push_str(&format!("  \x1b[36m{}\x1b[0m\n", unit));
        }
    }
    if plan.waves.is_empty() {
        out.push_str("Nothing to deploy\n");
    }
    if !plan.blocked.is_empty() {
        out.push_str("\n\x1b[31mBlocked:\x1b[0m\n");
        for blocked in &plan.blocked {
            out.push_str(&format!("  {}\n", blocked.unit));
            for token in &blocked.missing {
                out.push_str(&format!("    missing {}\n", token));
            }
        }
    }
    out
}

/// Format deployment status
pub fn print_status(ledger: Option<&DeploymentLedger>, json_output: bool, state_file: &Path) {
    if json_output {
        #[derive(Serialize)]
        struct StatusJson<'a> {
            state_file: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            ledger: Option<&'a DeploymentLedger>,
            pending_stages: Vec<Stage>,
        }

        let status = StatusJson {
            state_file: state_file.display().to_string(),
            ledger,
            pending_stages: Stage::ALL
                .into_iter()
                .filter(|s| !ledger.is_some_and(|l| l.is_stage_complete(*s)))
                .collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    println!("\x1b[1mDeployment Status\x1b[0m\n");
    println!("State file: {}", state_file.display());

    let Some(ledger) = ledger else {
        println!("\nNo deployments recorded");
        return;
    };
    if let Some(url) = &ledger.metadata.rpc_url {
        println!("RPC URL: {}", url);
    }
    if let Some(chain_id) = ledger.metadata.chain_id {
        println!("Chain id: {}", chain_id);
    }

    if !ledger.links.is_empty() {
        println!("\n\x1b[1mLinked units:\x1b[0m");
        for (unit, address) in ledger.links.iter() {
            println!("  {} {}", address, unit);
        }
    }
    if !ledger.instances.is_empty() {
        println!("\n\x1b[1mInstances:\x1b[0m");
        for (label, address) in &ledger.instances {
            println!("  {} {}", address, label);
        }
    }
    if !ledger.pools.is_empty() {
        println!("\n\x1b[1mPools:\x1b[0m");
        for (index, address) in ledger.pools.iter().enumerate() {
            println!("  [{}] {}", index, address);
        }
    }

    println!("\n\x1b[1mStages:\x1b[0m");
    for stage in Stage::ALL {
        let mark = if stage.is_repeatable() {
            "\x1b[36m↻\x1b[0m"
        } else if ledger.is_stage_complete(stage) {
            "\x1b[32m✓\x1b[0m"
        } else {
            "\x1b[33m…\x1b[0m"
        };
        println!("  {} {}", mark, stage);
    }

    if let Some(created) = &ledger.metadata.created_at {
        println!("\nCreated: {}", created);
    }
    if let Some(modified) = &ledger.metadata.last_modified {
        println!("Last modified: {}", modified);
    }
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            error: String,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            causes: Vec<String>,
        }

        let err = ErrorJson {
            error: error.to_string(),
            causes: error.chain().skip(1).map(|c| c.to_string()).collect(),
        };
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_failures() {
        let mut report = BatchReport::new(Stage::Prices);
        report.done("price:weth/usd");
        report.failed("price:usdc/usd", &"bad price");
        let text = format_report(&report, false);
        assert!(text.contains("1 failed"));
        assert!(text.contains("price:usdc/usd: bad price"));
        assert!(!text.contains("price:weth/usd"));
        assert!(format_report(&report, true).contains("price:weth/usd"));
    }

    #[test]
    fn test_error_json_has_causes() {
        let err = anyhow::anyhow!("inner").context("outer");
        let json: serde_json::Value = serde_json::from_str(&format_error(&err, true)).unwrap();
        assert_eq!(json["error"], "outer");
        assert_eq!(json["causes"][0], "inner");
    }
}
