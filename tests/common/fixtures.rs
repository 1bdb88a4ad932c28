//! Fixture project: compiled artifacts for a small lending deployment.

use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use evm_deployer::core::PoolInitParam;
use evm_deployer::linker::placeholder_for;
use evm_deployer::types::UnitId;

pub const PRICE_LIB: &str = "contracts/libraries/PriceLib.sol:PriceLib";
pub const FACTORY: &str = "contracts/LendingPoolFactory.sol:LendingPoolFactory";

const CREATION_CODE: &str = "0x608060405234801561001057600080fd5b50";

pub const SPEC_YAML: &str = r#"
version: 1
name: fixture
network:
  chain_id: 31337
libraries:
  - contracts/libraries/PriceLib.sol:PriceLib
factory:
  unit: contracts/LendingPoolFactory.sol:LendingPoolFactory
pool_unit: contracts/LendingPool.sol:LendingPool
oracle:
  unit: contracts/oracle/DIAOracleV2Multiupdate.sol:DIAOracleV2
investment_module:
  unit: contracts/invest/InvestmentModule.sol:InvestmentModule
tokens:
  - { symbol: USDC, unit: "contracts/mock/tokens/USDC.sol:USDC", decimals: 6 }
  - { symbol: WETH, unit: "contracts/mock/tokens/WETH.sol:WETH" }
reward_modules:
  unit: contracts/mock/rewards/MockRewardModule.sol:MockRewardModule
  reward_token: WETH
  symbols: [WETH]
pools:
  - { principal: USDC, collaterals: [WETH] }
prices:
  - { key: weth/usd, price: "2448" }
  - { key: usdc/usd, price: "1" }
test_users:
  - "0x8581B861F2E45f77eB605a0ED8D28c65d46db7D9"
mint:
  user_amount: "1000"
  reward_funding: "500"
"#;

fn param(kind: &str) -> Value {
    json!({ "name": "", "type": kind })
}

fn function(name: &str, inputs: Vec<Value>, mutability: &str) -> Value {
    json!({ "type": "function", "name": name, "inputs": inputs, "stateMutability": mutability })
}

fn constructor(inputs: Vec<Value>) -> Value {
    json!({ "type": "constructor", "inputs": inputs })
}

/// A temp dir holding `deploy.yaml` and `artifacts/`.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self::with_spec(SPEC_YAML)
    }

    pub fn with_spec(spec: &str) -> Self {
        let project = Self {
            dir: TempDir::new().unwrap(),
        };
        fs::write(project.spec_path(), spec).unwrap();
        project.write_artifacts();
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn spec_path(&self) -> PathBuf {
        self.path().join("deploy.yaml")
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join("deployments.json")
    }

    /// `evm-deploy --spec <project>/deploy.yaml`, run inside the project.
    pub fn command(&self) -> Command {
        let mut cmd = evm_deploy();
        cmd.current_dir(self.path()).arg("--spec").arg(self.spec_path());
        cmd
    }

    pub fn write_artifact(&self, unit: &str, abi: Vec<Value>, links: &[&str]) {
        let id = UnitId::parse(unit).unwrap();
        let mut bytecode = CREATION_CODE.to_string();
        let mut link_references = serde_json::Map::new();
        for link in links {
            let lib = UnitId::parse(link).unwrap();
            let start = (bytecode.len() - 2) / 2;
            bytecode.push_str(placeholder_for(&lib).as_str());
            link_references.insert(
                lib.source_path().to_string(),
                json!({ lib.name(): [{ "start": start, "length": 20 }] }),
            );
        }

        let artifact = json!({
            "_format": "hh-sol-artifact-1",
            "contractName": id.name(),
            "sourceName": id.source_path(),
            "abi": abi,
            "bytecode": bytecode,
            "deployedBytecode": "0x",
            "linkReferences": link_references,
        });
        let path = self
            .path()
            .join("artifacts")
            .join(id.source_path())
            .join(format!("{}.json", id.name()));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(&artifact).unwrap()).unwrap();
    }

    fn write_artifacts(&self) {
        let erc20 = || {
            vec![
                constructor(vec![param("address")]),
                function("mint", vec![param("address"), param("uint256")], "nonpayable"),
            ]
        };
        let init = serde_json::to_value(PoolInitParam::abi_param()).unwrap();

        self.write_artifact(PRICE_LIB, vec![], &[]);
        self.write_artifact(
            FACTORY,
            vec![
                function("createLendingPool", vec![], "nonpayable"),
                function("poolAddresses", vec![param("uint256")], "view"),
            ],
            &[PRICE_LIB],
        );
        self.write_artifact(
            "contracts/LendingPool.sol:LendingPool",
            vec![
                function("initialize", vec![init], "nonpayable"),
                function(
                    "setTokenRewardModule",
                    vec![param("address"), param("address")],
                    "nonpayable",
                ),
            ],
            &[],
        );
        self.write_artifact(
            "contracts/oracle/DIAOracleV2Multiupdate.sol:DIAOracleV2",
            vec![function(
                "setMultipleValues",
                vec![param("string[]"), param("uint256[]")],
                "nonpayable",
            )],
            &[],
        );
        self.write_artifact("contracts/invest/InvestmentModule.sol:InvestmentModule", vec![], &[]);
        self.write_artifact("contracts/mock/tokens/USDC.sol:USDC", erc20(), &[]);
        self.write_artifact("contracts/mock/tokens/WETH.sol:WETH", erc20(), &[]);
        self.write_artifact(
            "contracts/mock/rewards/MockRewardModule.sol:MockRewardModule",
            vec![constructor(vec![
                param("address"),
                param("address"),
                param("uint256"),
            ])],
            &[],
        );
    }
}

/// The CLI binary with network-related environment cleared.
pub fn evm_deploy() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("evm-deploy").unwrap();
    cmd.env_remove("EVM_DEPLOY_RPC_URL")
        .env_remove("EVM_DEPLOY_SENDER")
        .env_remove("EVM_DEPLOY_STATE_FILE")
        .env_remove("EVM_DEPLOY_PRIVATE_KEY")
        .env_remove("EVM_DEPLOY_CHAIN_ID")
        .env_remove("EVM_DEPLOY_ORACLE_BACKDATE")
        .env_remove("EVM_DEPLOY_SEQUENTIAL")
        .env("RUST_LOG", "error");
    cmd
}
