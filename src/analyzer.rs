// src/analyzer.rs
//! End-to-end analysis: parse, apply rules, ask the optional provider,
//! rank, attach measured gas.

use futures::future::join_all;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapters::GasDataProvider;
use crate::config::GuardConfig;
use crate::error::{GuardError, Result};
use crate::integrator::{integrate, summarize};
use crate::llm::{FunctionMetadata, ProviderError, SuggestionProvider};
use crate::parser::ContractParser;
use crate::ranker::SuggestionRanker;
use crate::rules::RuleEngine;
use crate::types::*;

pub struct Analyzer {
    parser: Box<dyn ContractParser>,
    rules: RuleEngine,
    ranker: SuggestionRanker,
    gas: Option<Box<dyn GasDataProvider>>,
    provider: Option<Box<dyn SuggestionProvider>>,
    provider_timeout: Duration,
}

impl Analyzer {
    /// Static-only analyzer configured from `config`; attach collaborators
    /// with the `with_*` builders.
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            parser: config.parser.build(),
            rules: RuleEngine::new(config.rules.clone()),
            ranker: SuggestionRanker::new(config.ranking.similarity_threshold),
            gas: None,
            provider: None,
            provider_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }

    pub fn with_gas_provider(mut self, gas: Box<dyn GasDataProvider>) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_suggestion_provider(mut self, provider: Box<dyn SuggestionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn framework(&self) -> Option<Framework> {
        self.gas.as_ref().map(|g| g.framework())
    }

    /// Analyzes source text that is already in memory. `file` is only used
    /// for labelling.
    pub async fn analyze_source(&self, source: &str, file: &str, costs: &GasData) -> ContractAnalysis {
        let contract = self.parser.parse(source);
        let mut diagnostics = Vec::new();

        if contract.is_invalid() {
            diagnostics.push(Diagnostic::new(
                "parser",
                "No contract, interface or library declaration found",
            ));
        }
        debug!(
            "{}: {} functions via {} parser",
            file,
            contract.functions.len(),
            self.parser.name()
        );

        let generated = join_all(contract.functions.iter().map(|f| self.generate_for(f))).await;

        let ranked = contract
            .functions
            .iter()
            .zip(generated)
            .map(|(function, generated)| {
                let static_suggestions = self.rules.analyze(function);
                let generated = match generated {
                    Ok(suggestions) => suggestions,
                    Err(e) => {
                        warn!("Generated suggestions for `{}` failed: {}", function.name, e);
                        diagnostics.push(Diagnostic::new(
                            "llm",
                            format!("{}: {}", function.name, e),
                        ));
                        Vec::new()
                    }
                };
                self.ranker.merge(&[static_suggestions, generated])
            })
            .collect();

        let mut analysis = integrate(contract, file, ranked, costs);
        analysis.framework = self.framework();
        analysis.diagnostics = diagnostics;
        analysis
    }

    async fn generate_for(&self, function: &Function) -> std::result::Result<Vec<Suggestion>, ProviderError> {
        let Some(provider) = &self.provider else {
            return Ok(Vec::new());
        };

        let metadata = FunctionMetadata::from(function);
        match tokio::time::timeout(
            self.provider_timeout,
            provider.generate(&function.source_code, &metadata),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.provider_timeout.as_secs())),
        }
    }

    /// Reads and analyzes one file, pulling measured gas for its project.
    pub async fn analyze_file(&self, path: &Path) -> Result<ContractAnalysis> {
        let source = fs::read_to_string(path).map_err(|e| GuardError::from_io(path, e))?;
        info!("Analyzing {}", path.display());

        let mut gas_diagnostic = None;
        let costs = match &self.gas {
            Some(gas) => {
                let data = gas.gas_data(Some(path));
                if data.is_empty() {
                    gas_diagnostic = Some(Diagnostic::new(
                        "gas-data",
                        format!(
                            "No {} gas data found, using static analysis only",
                            gas.framework()
                        ),
                    ));
                } else {
                    info!("Loaded gas data for {} functions", data.len());
                }
                data
            }
            None => GasData::new(),
        };

        let mut analysis = self
            .analyze_source(&source, &path.display().to_string(), &costs)
            .await;
        analysis.diagnostics.extend(gas_diagnostic);
        Ok(analysis)
    }

    /// Analyzes every path; a file that cannot be read is recorded as a
    /// failure and the rest continue.
    pub async fn analyze_files(&self, paths: &[PathBuf]) -> BatchAnalysis {
        let mut contracts = Vec::new();
        let mut failures = Vec::new();

        for path in paths {
            match self.analyze_file(path).await {
                Ok(analysis) => contracts.push(analysis),
                Err(e) => {
                    warn!("{}", e);
                    failures.push(FileFailure {
                        file: path.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        BatchAnalysis {
            summary: summarize(&contracts),
            contracts,
            failures,
            framework: self.framework(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
