// src/adapters/mod.rs
//! Measured gas from test frameworks.
//!
//! Adapters never fail: anything that goes wrong (no project, tool missing,
//! unreadable report) is logged and yields an empty map, which callers read
//! as "no data".

pub mod foundry;
pub mod hardhat;

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::types::{Framework, GasData};

pub use foundry::FoundryAdapter;
pub use hardhat::HardhatAdapter;

/// Directories searched above a contract before giving up.
pub const MAX_ROOT_DEPTH: usize = 10;

pub trait GasDataProvider: Send + Sync {
    /// Lowercase function name → measured gas for the project that owns
    /// `contract_path` (or the adapter's default root).
    fn gas_data(&self, contract_path: Option<&Path>) -> GasData;

    fn framework(&self) -> Framework;
}

pub fn for_framework(
    framework: Framework,
    default_root: PathBuf,
    run_tool: bool,
) -> Box<dyn GasDataProvider> {
    match framework {
        Framework::Foundry => Box::new(FoundryAdapter::new(default_root, run_tool)),
        Framework::Hardhat => Box::new(HardhatAdapter::new(default_root, run_tool)),
    }
}

/// Nearest directory at or above the contract's directory for which
/// `is_root` holds, looking at most [`MAX_ROOT_DEPTH`] levels.
pub fn find_project_root(contract_path: &Path, is_root: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    let absolute = std::path::absolute(contract_path).ok()?;
    let mut current = absolute.parent()?.to_path_buf();

    for _ in 0..MAX_ROOT_DEPTH {
        if is_root(&current) {
            debug!("Project root found at {}", current.display());
            return Some(current);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

/// Runs `program` in `dir` and returns its stdout, or `None` if it could not
/// be started.
fn run_tool(program: &str, args: &[&str], dir: &Path, envs: &[(&str, &str)]) -> Option<String> {
    debug!("Running `{} {}` in {}", program, args.join(" "), dir.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .envs(envs.iter().copied())
        .output();

    match output {
        Ok(output) => {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    "`{} {}` exited with {}: {}",
                    program,
                    args.join(" "),
                    output.status,
                    stderr.lines().last().unwrap_or_default()
                );
            }
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Err(e) => {
            warn!("Could not run `{}`: {}", program, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_root_found_above_contract() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/tokens")).unwrap();
        fs::write(dir.path().join("marker"), "").unwrap();
        let contract = dir.path().join("src/tokens/Token.sol");

        let root = find_project_root(&contract, |d| d.join("marker").is_file());

        assert_eq!(root.unwrap(), std::path::absolute(dir.path()).unwrap());
    }

    #[test]
    fn test_root_search_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let deep: PathBuf = (0..12).fold(dir.path().to_path_buf(), |p, i| p.join(format!("d{i}")));
        fs::create_dir_all(&deep).unwrap();
        fs::write(dir.path().join("marker"), "").unwrap();

        let root = find_project_root(&deep.join("C.sol"), |d| d.join("marker").is_file());

        assert!(root.is_none());
    }

    #[test]
    fn test_missing_tool_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_tool("gas-guardian-no-such-binary", &[], dir.path(), &[]).is_none());
    }

    #[test]
    fn test_for_framework_picks_adapter() {
        let dir = tempfile::tempdir().unwrap();

        let foundry = for_framework(Framework::Foundry, dir.path().to_path_buf(), false);
        let hardhat = for_framework(Framework::Hardhat, dir.path().to_path_buf(), false);

        assert_eq!(foundry.framework(), Framework::Foundry);
        assert_eq!(hardhat.framework(), Framework::Hardhat);
        assert!(foundry.gas_data(None).is_empty());
        assert!(hardhat.gas_data(None).is_empty());
    }
}
