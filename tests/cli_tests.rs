mod common;

use alloy_primitives::Address;
use predicates::prelude::*;

use common::fixtures::{FACTORY, PRICE_LIB, SPEC_YAML};
use common::{evm_deploy, Project};
use evm_deployer::core::{DeploymentLedger, Stage};
use evm_deployer::types::UnitId;

const PACKED_2448: &str = "83301123422245735855834103899296858164430500000000";

#[test]
fn test_help_lists_commands() {
    evm_deploy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("encode-price"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_encode_price_json() {
    let output = evm_deploy()
        .args(["--json", "encode-price", "2448", "--timestamp", "1700000000"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["packed"], PACKED_2448);
    assert_eq!(json["mantissa"], "244800000000");
    assert_eq!(json["timestamp"], "1700000000");
}

#[test]
fn test_decode_price_roundtrip() {
    evm_deploy()
        .args(["decode-price", PACKED_2448])
        .assert()
        .success()
        .stdout(predicate::str::contains("Price:     2448\n"))
        .stdout(predicate::str::contains("Timestamp: 1700000000"));
}

#[test]
fn test_encode_price_rejects_negative() {
    evm_deploy()
        .args(["encode-price", "--timestamp", "0", "--", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid decimal '-1'"));
}

#[test]
fn test_plan_orders_library_before_factory() {
    let project = Project::new();
    let output = project.command().args(["--json", "plan"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["waves"][0][0], PRICE_LIB);
    assert_eq!(plan["waves"][1][0], FACTORY);
    assert_eq!(plan["blocked"].as_array().unwrap().len(), 0);
}

#[test]
fn test_plan_skips_recorded_libraries() {
    let project = Project::new();
    let mut ledger = DeploymentLedger::new();
    ledger
        .record_unit(UnitId::parse(PRICE_LIB).unwrap(), Address::repeat_byte(7))
        .unwrap();
    ledger.save(&project.state_path()).unwrap();

    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already deployed"))
        .stdout(predicate::str::contains("Wave 0"))
        .stdout(predicate::str::contains("Wave 1").not());
}

#[test]
fn test_plan_reports_missing_artifact() {
    let project = Project::new();
    std::fs::remove_dir_all(project.path().join("artifacts/contracts/libraries")).unwrap();
    project
        .command()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains(PRICE_LIB));
}

#[test]
fn test_dry_run_deploys_everything() {
    let project = Project::new();
    let output = project
        .command()
        .args(["--dry-run", "--json", "deploy"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    let stages = json["stages"].as_array().unwrap();
    assert_eq!(stages.len(), Stage::ALL.len());
    assert_eq!(stages[0]["stage"], "tokens");
    assert_eq!(stages[7]["entries"][0]["key"], "price:weth/usd");
    assert!(!project.state_path().exists());
}

#[test]
fn test_dry_run_rejects_bad_private_key() {
    let project = Project::new();
    project
        .command()
        .env("EVM_DEPLOY_PRIVATE_KEY", "0x1234")
        .args(["--dry-run", "deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid EVM_DEPLOY_PRIVATE_KEY"))
        .stderr(predicate::str::contains("must be 32 bytes"));
}

#[test]
fn test_dry_run_single_stage() {
    let project = Project::new();
    project
        .command()
        .args(["--dry-run", "deploy", "--stage", "tokens", "--stage", "oracle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tokens"))
        .stdout(predicate::str::contains("oracle"))
        .stdout(predicate::str::contains("libraries").not());
}

#[test]
fn test_deploy_rejects_unknown_stage() {
    let project = Project::new();
    project
        .command()
        .args(["deploy", "--stage", "everything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
}

#[test]
fn test_deploy_requires_rpc_endpoint() {
    let project = Project::new();
    project
        .command()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no RPC endpoint"));
}

#[test]
fn test_invalid_spec_lists_issues() {
    let project = Project::with_spec(&SPEC_YAML.replace("principal: USDC", "principal: DOGE"));
    project
        .command()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Deployment spec validation failed"))
        .stderr(predicate::str::contains("DOGE"));
}

#[test]
fn test_link_reports_undeployed_library() {
    let project = Project::new();
    project
        .command()
        .args(["link", FACTORY])
        .assert()
        .failure()
        .stderr(predicate::str::contains("undeployed libraries"))
        .stderr(predicate::str::contains(PRICE_LIB));
}

#[test]
fn test_link_with_recorded_library() {
    let project = Project::new();
    let mut ledger = DeploymentLedger::new();
    ledger
        .record_unit(UnitId::parse(PRICE_LIB).unwrap(), Address::repeat_byte(0xab))
        .unwrap();
    ledger.save(&project.state_path()).unwrap();

    let out = project.path().join("factory.hex");
    project
        .command()
        .args(["link", FACTORY, "--output"])
        .arg(&out)
        .assert()
        .success();

    let linked = std::fs::read_to_string(&out).unwrap();
    assert!(linked.ends_with(&"ab".repeat(20)));
    assert!(!linked.contains("__$"));
}

#[test]
fn test_status_and_clean() {
    let project = Project::new();
    project
        .command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No deployments recorded"));

    let mut ledger = DeploymentLedger::new();
    ledger
        .record_instance("oracle", Address::repeat_byte(3))
        .unwrap();
    ledger.mark_stage_complete(Stage::Tokens);
    ledger.save(&project.state_path()).unwrap();

    let output = project.command().args(["--json", "status"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["ledger"]["instances"]["oracle"].is_string());
    assert_eq!(json["pending_stages"].as_array().unwrap().len(), Stage::ALL.len() - 1);

    project
        .command()
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed state file"));
    assert!(!project.state_path().exists());
}
