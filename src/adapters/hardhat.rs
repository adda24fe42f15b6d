// src/adapters/hardhat.rs
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::{GasDataProvider, find_project_root, run_tool};
use crate::types::{Framework, GasData};

/// Report locations, relative to the project root, in lookup order.
pub const REPORT_FILES: &[&str] = &[
    "gasReporterOutput.json",
    "gas-report.json",
    "reports/gas-report.json",
    ".gas-report.json",
];

// `|  Token  ·  transfer  ·  51234  ·  53000  ·  52117  ·  4  ·` (avg is the
// third numeric column)
static TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|\s*(\w+)\s*·\s*(\w+)\s*·[^·]*·[^·]*·\s*(\d+)\s*·").unwrap()
});

static GAS_USED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\w+)\s+gas used:\s*(\d+)").unwrap());

/// Reads hardhat-gas-reporter output, running the test suite with
/// `REPORT_GAS=true` when no report exists.
#[derive(Debug, Clone)]
pub struct HardhatAdapter {
    default_root: PathBuf,
    run_tool: bool,
}

impl HardhatAdapter {
    pub fn new(default_root: PathBuf, run_tool: bool) -> Self {
        Self {
            default_root,
            run_tool,
        }
    }

    pub fn is_project(dir: &Path) -> bool {
        dir.join("hardhat.config.js").is_file()
            || dir.join("hardhat.config.ts").is_file()
            || package_lists_hardhat(&dir.join("package.json"))
    }

    fn project_dir(&self, contract_path: Option<&Path>) -> PathBuf {
        contract_path
            .and_then(|path| find_project_root(path, Self::is_project))
            .unwrap_or_else(|| self.default_root.clone())
    }

    /// First report file that exists under `dir`, parsed.
    pub fn load_report(dir: &Path) -> Option<GasData> {
        let path = REPORT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())?;

        debug!("Reading gas report from {}", path.display());
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                return None;
            }
        };
        Some(parse_report(&content))
    }

    fn generate_report(&self, dir: &Path) -> GasData {
        if !Self::is_project(dir) {
            debug!("{} is not a Hardhat project", dir.display());
            return GasData::new();
        }

        info!("Running npx hardhat test in {}", dir.display());
        let Some(stdout) = run_tool("npx", &["hardhat", "test"], dir, &[("REPORT_GAS", "true")])
        else {
            return GasData::new();
        };

        let from_output = parse_test_output(&stdout);
        if !from_output.is_empty() {
            return from_output;
        }
        Self::load_report(dir).unwrap_or_default()
    }
}

impl GasDataProvider for HardhatAdapter {
    fn gas_data(&self, contract_path: Option<&Path>) -> GasData {
        let dir = self.project_dir(contract_path);

        let data = Self::load_report(&dir).unwrap_or_default();
        if !data.is_empty() || !self.run_tool {
            return data;
        }
        self.generate_report(&dir)
    }

    fn framework(&self) -> Framework {
        Framework::Hardhat
    }
}

fn package_lists_hardhat(path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(pkg) => ["dependencies", "devDependencies"]
            .iter()
            .any(|section| pkg[section].get("hardhat").is_some()),
        Err(e) => {
            debug!("Ignoring unparsable {}: {}", path.display(), e);
            false
        }
    }
}

/// JSON reports in either known shape; anything else is read as the
/// reporter's text table.
pub fn parse_report(content: &str) -> GasData {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(content) {
            Ok(report) => return parse_json_report(&report),
            Err(e) => debug!("Gas report is not valid JSON ({}), trying text table", e),
        }
    }
    parse_report_table(content)
}

/// `info.methods.<contract>.<method>.avg` and `methods.<method>.gasUsed`.
pub fn parse_json_report(report: &Value) -> GasData {
    let mut data = GasData::new();

    if let Some(contracts) = report["info"]["methods"].as_object() {
        for methods in contracts.values().filter_map(Value::as_object) {
            for (method, stats) in methods {
                if let Some(avg) = as_gas(&stats["avg"]) {
                    data.insert(method.to_lowercase(), avg);
                }
            }
        }
    }

    if let Some(methods) = report["methods"].as_object() {
        for (method, stats) in methods {
            if let Some(used) = as_gas(&stats["gasUsed"]) {
                data.insert(method.to_lowercase(), used);
            }
        }
    }

    data
}

fn as_gas(value: &Value) -> Option<u64> {
    let gas = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (gas > 0).then_some(gas)
}

pub fn parse_report_table(content: &str) -> GasData {
    content
        .lines()
        .filter_map(|line| TABLE_ROW.captures(line))
        .filter_map(|caps| {
            let avg: u64 = caps[3].parse().ok()?;
            (avg > 0).then(|| (caps[2].to_lowercase(), avg))
        })
        .collect()
}

/// `name gas used: N` lines printed by tests.
pub fn parse_test_output(output: &str) -> GasData {
    output
        .lines()
        .filter_map(|line| GAS_USED_LINE.captures(line))
        .filter_map(|caps| Some((caps[1].to_lowercase(), caps[2].parse().ok()?)))
        .collect()
}
