// src/config.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{GuardError, Result};
use crate::parser::ParserKind;
use crate::rules::RULE_IDS;
use crate::types::Framework;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "gas-guardian.toml";

/// Top-level configuration. Every field has a default, so an empty or
/// missing file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub framework: Framework,
    pub parser: ParserKind,
    pub ranking: RankingConfig,
    pub rules: RulesConfig,
    pub llm: LlmConfig,
    pub gas: GasConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Messages more similar than this are treated as duplicates
    pub similarity_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
        }
    }
}

/// Per-rule switches for the static rule engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule ids that never fire
    pub disabled: Vec<String>,
    /// Rule id → confidence override
    pub confidence: HashMap<String, f64>,
}

impl RulesConfig {
    pub fn is_disabled(&self, rule: &str) -> bool {
        self.disabled.iter().any(|id| id == rule)
    }

    /// Configured confidence for `rule`, clamped to `[0, 1]`, or `default`
    /// when unset or not a finite number.
    pub fn confidence_for(&self, rule: &str, default: f64) -> f64 {
        self.confidence
            .get(rule)
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(default)
    }

    /// Ids mentioned in the config that no rule uses.
    pub fn unknown_ids(&self) -> Vec<&str> {
        self.disabled
            .iter()
            .chain(self.confidence.keys())
            .map(String::as_str)
            .filter(|id| !RULE_IDS.contains(id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// OpenAI-compatible chat completions URL
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub cache_ttl_hours: u64,
    /// On-disk cache location; `~/.gas-guardian/cache` when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            max_tokens: 512,
            temperature: 0.1,
            cache_ttl_hours: 24,
            cache_dir: None,
        }
    }
}

impl LlmConfig {
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".gas-guardian").join("cache")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Run `forge snapshot` / `npx hardhat test` when no report exists
    pub run_tool: bool,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self { run_tool: true }
    }
}

impl GuardConfig {
    /// Loads `path` if given, else `gas-guardian.toml` in the working
    /// directory if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GuardError::from_io(path, e))?;
        let config = Self::from_toml(&content).map_err(|message| GuardError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;

        if !(0.0..=1.0).contains(&config.ranking.similarity_threshold) {
            return Err(format!(
                "ranking.similarity_threshold must be within [0, 1], got {}",
                config.ranking.similarity_threshold
            ));
        }
        let mut non_finite: Vec<&str> = config
            .rules
            .confidence
            .iter()
            .filter(|(_, c)| !c.is_finite())
            .map(|(id, _)| id.as_str())
            .collect();
        if !non_finite.is_empty() {
            non_finite.sort_unstable();
            return Err(format!(
                "rules.confidence must be finite numbers, got non-finite values for {}",
                non_finite.join(", ")
            ));
        }
        for id in config.rules.unknown_ids() {
            warn!("Configuration mentions unknown rule id `{}`", id);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GuardConfig::from_toml("").unwrap();

        assert_eq!(config, GuardConfig::default());
        assert_eq!(config.ranking.similarity_threshold, 0.7);
        assert_eq!(config.framework, Framework::Foundry);
        assert_eq!(config.parser, ParserKind::Text);
        assert!(!config.llm.enabled);
        assert!(config.gas.run_tool);
    }

    #[test]
    fn test_partial_config_overrides_fields() {
        let config = GuardConfig::from_toml(
            r#"
framework = "hardhat"
parser = "masking"

[ranking]
similarity_threshold = 0.5

[rules]
disabled = ["patterns.getter"]

[rules.confidence]
"loop.general" = 0.95

[llm]
enabled = true
model = "local-model"
"#,
        )
        .unwrap();

        assert_eq!(config.framework, Framework::Hardhat);
        assert_eq!(config.parser, ParserKind::Masking);
        assert_eq!(config.ranking.similarity_threshold, 0.5);
        assert!(config.rules.is_disabled("patterns.getter"));
        assert_eq!(config.rules.confidence_for("loop.general", 0.9), 0.95);
        assert_eq!(config.rules.confidence_for("loop.nested", 0.7), 0.7);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.max_tokens, 512);
    }

    #[test]
    fn test_confidence_override_is_clamped() {
        let mut rules = RulesConfig::default();
        rules.confidence.insert("loop.general".to_string(), 1.7);

        assert_eq!(rules.confidence_for("loop.general", 0.9), 1.0);
    }

    #[test]
    fn test_non_finite_confidence_is_rejected() {
        let err = GuardConfig::from_toml("[rules.confidence]\n\"loop.general\" = nan\n")
            .unwrap_err();
        assert!(err.contains("loop.general"));

        let err = GuardConfig::from_toml("[rules.confidence]\n\"loop.nested\" = inf\n")
            .unwrap_err();
        assert!(err.contains("loop.nested"));

        let mut rules = RulesConfig::default();
        rules.confidence.insert("loop.general".to_string(), f64::NAN);
        assert_eq!(rules.confidence_for("loop.general", 0.9), 0.9);
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let err = GuardConfig::from_toml("[ranking]\nsimilarity_threshold = 1.5").unwrap_err();
        assert!(err.contains("similarity_threshold"));
    }

    #[test]
    fn test_unknown_rule_ids_are_reported() {
        let mut rules = RulesConfig::default();
        rules.disabled.push("loop.general".to_string());
        rules.disabled.push("loop.bogus".to_string());

        assert_eq!(rules.unknown_ids(), vec!["loop.bogus"]);
    }

    #[test]
    fn test_from_file_reports_path_on_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "framework = [").unwrap();

        let err = GuardConfig::from_file(file.path()).unwrap_err();

        assert!(matches!(err, GuardError::Config { .. }));
    }

    #[test]
    fn test_missing_explicit_config_is_not_found() {
        let err = GuardConfig::load(Some(Path::new("/no/such/gas-guardian.toml"))).unwrap_err();
        assert!(matches!(err, GuardError::NotFound(_)));
    }
}
