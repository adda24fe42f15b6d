// src/adapters/foundry.rs
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use super::{GasDataProvider, find_project_root, run_tool};
use crate::types::{Framework, GasData};

pub const SNAPSHOT_FILE: &str = ".gas-snapshot";

// `Token:testTransfer() (gas: 51234)`; older forge versions print `::`.
static SNAPSHOT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+)::?test_?(\w+)\(\)\s+\(gas:\s*(\d+)\)").unwrap()
});

static GAS_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"gas:\s*(\d+)").unwrap());

static TEST_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)test_?(\w+)").unwrap());

/// Reads `.gas-snapshot`, running `forge snapshot` when it is missing.
#[derive(Debug, Clone)]
pub struct FoundryAdapter {
    default_root: PathBuf,
    run_tool: bool,
}

impl FoundryAdapter {
    pub fn new(default_root: PathBuf, run_tool: bool) -> Self {
        Self {
            default_root,
            run_tool,
        }
    }

    pub fn is_project(dir: &Path) -> bool {
        dir.join("foundry.toml").is_file() || dir.join("lib").is_dir()
    }

    fn project_dir(&self, contract_path: Option<&Path>) -> PathBuf {
        contract_path
            .and_then(|path| find_project_root(path, Self::is_project))
            .unwrap_or_else(|| self.default_root.clone())
    }

    pub fn load_snapshot(dir: &Path) -> Option<GasData> {
        let path = dir.join(SNAPSHOT_FILE);
        let content = fs::read_to_string(&path).ok()?;
        debug!("Reading gas snapshot from {}", path.display());
        Some(parse_snapshot(&content))
    }

    fn generate_snapshot(&self, dir: &Path) -> GasData {
        if !Self::is_project(dir) {
            debug!("{} is not a Foundry project", dir.display());
            return GasData::new();
        }

        info!("Running forge snapshot in {}", dir.display());
        let Some(stdout) = run_tool("forge", &["snapshot"], dir, &[]) else {
            return GasData::new();
        };

        match Self::load_snapshot(dir) {
            Some(data) if !data.is_empty() => data,
            _ => parse_test_output(&stdout),
        }
    }
}

impl GasDataProvider for FoundryAdapter {
    fn gas_data(&self, contract_path: Option<&Path>) -> GasData {
        let dir = self.project_dir(contract_path);

        let data = Self::load_snapshot(&dir).unwrap_or_default();
        if !data.is_empty() || !self.run_tool {
            return data;
        }
        self.generate_snapshot(&dir)
    }

    fn framework(&self) -> Framework {
        Framework::Foundry
    }
}

/// Parses `Contract:testName() (gas: N)` lines. The function name is the
/// part after `test` (and an optional `_`), lowercased.
pub fn parse_snapshot(content: &str) -> GasData {
    content
        .lines()
        .filter_map(|line| SNAPSHOT_LINE.captures(line))
        .filter_map(|caps| Some((caps[2].to_lowercase(), caps[3].parse().ok()?)))
        .collect()
}

/// Parses test runner lines such as `[PASS] testTransfer() (gas: 51234)`.
pub fn parse_test_output(output: &str) -> GasData {
    output
        .lines()
        .filter(|line| line.contains("gas:") && line.contains("test"))
        .filter_map(|line| {
            let gas = GAS_FIELD.captures(line)?[1].parse().ok()?;
            let name = TEST_NAME.captures(line)?[1].to_lowercase();
            Some((name, gas))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "\
GasTestContractTest:testBatchTransfer() (gas: 250431)
GasTestContractTest:test_transfer() (gas: 51234)
GasTestContractTest:testFuzz_deposit(uint256) (runs: 256, μ: 43210, ~: 43000)
LegacyTest::testApprove() (gas: 46120)
";

    #[test]
    fn test_snapshot_lines_parse() {
        let data = parse_snapshot(SNAPSHOT);

        assert_eq!(data.get("batchtransfer"), Some(&250_431));
        assert_eq!(data.get("transfer"), Some(&51_234));
        assert_eq!(data.get("approve"), Some(&46_120));
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_forge_test_output_parses() {
        let output = "Ran 2 tests for test/Token.t.sol:TokenTest\n[PASS] testTransfer() (gas: 51234)\n[PASS] test_Mint() (gas: 70011)\nSuite result: ok.";

        let data = parse_test_output(output);

        assert_eq!(data.get("transfer"), Some(&51_234));
        assert_eq!(data.get("mint"), Some(&70_011));
    }

    #[test]
    fn test_existing_snapshot_found_from_contract_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foundry.toml"), "[profile.default]\n").unwrap();
        fs::write(dir.path().join(SNAPSHOT_FILE), SNAPSHOT).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();

        let adapter = FoundryAdapter::new(PathBuf::from("/nonexistent"), false);
        let data = adapter.gas_data(Some(&dir.path().join("src/GasTestContract.sol")));

        assert_eq!(data.get("transfer"), Some(&51_234));
    }

    #[test]
    fn test_no_snapshot_without_tool_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foundry.toml"), "").unwrap();

        let adapter = FoundryAdapter::new(dir.path().to_path_buf(), false);

        assert!(adapter.gas_data(None).is_empty());
    }

    #[test]
    fn test_non_project_never_runs_tool() {
        let dir = tempfile::tempdir().unwrap();

        let adapter = FoundryAdapter::new(dir.path().to_path_buf(), true);

        assert!(adapter.gas_data(None).is_empty());
    }
}
