// src/reporter.rs
use anyhow::Result;
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use std::fmt::{self, Write};

use crate::types::*;

/// Terminal layout for `analyze`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    List,
    Table,
    Json,
}

/// File formats for `report`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

/// Reporter for displaying batch analysis results.
///
/// Terminal output comes in three layouts:
/// - `list`  : one line per function with gas and savings (default)
/// - `table` : aligned function table per contract
/// - `json`  : the whole batch as pretty-printed JSON
///
/// Rendering writes into any `fmt::Write` sink; the `render_*` entry points
/// return strings and callers decide where they go.
pub struct Reporter {
    /// Whether ANSI color codes should be used in terminal output
    use_color: bool,
}

impl Reporter {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn paint(&self, text: &str, style: impl FnOnce(&str) -> ColoredString) -> String {
        if self.use_color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Summary followed by every contract in the requested layout.
    pub fn render_analysis(&self, batch: &BatchAnalysis, format: OutputFormat) -> Result<String> {
        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(batch)?);
        }

        let mut out = String::new();
        self.write_analysis(&mut out, batch, format)?;
        Ok(out)
    }

    fn write_analysis(
        &self,
        out: &mut impl Write,
        batch: &BatchAnalysis,
        format: OutputFormat,
    ) -> fmt::Result {
        self.write_summary(out, &batch.summary, batch.framework)?;
        for contract in &batch.contracts {
            self.write_contract(out, contract, format)?;
        }
        self.write_failures(out, &batch.failures)
    }

    fn write_summary(
        &self,
        out: &mut impl Write,
        summary: &AnalysisSummary,
        framework: Option<Framework>,
    ) -> fmt::Result {
        let framework = framework_label(framework);

        writeln!(out, "\n{}", self.paint("📊 Analysis Summary", |s| s.bright_cyan().bold()))?;
        writeln!(out, "{}", self.paint(&format!("Framework: {}", framework), |s| s.dimmed()))?;
        writeln!(
            out,
            "{}",
            self.paint(
                &format!(
                    "Contracts: {} | Functions: {}",
                    summary.total_contracts, summary.total_functions
                ),
                |s| s.dimmed()
            )
        )?;

        if summary.total_gas_usage > 0 {
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!("✅ Total Gas Usage: {}", thousands(summary.total_gas_usage)),
                    |s| s.bright_green()
                )
            )?;
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!(
                        "💰 Potential Savings: {} gas ({}%)",
                        thousands(summary.total_potential_savings),
                        summary.potential_savings_percentage
                    ),
                    |s| s.bright_yellow()
                )
            )?;
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!("📈 Gas Data Coverage: {}%", summary.gas_data_coverage),
                    |s| s.bright_blue()
                )
            )?;
        } else {
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!("⚠️  No gas data available - run tests with {} first", framework),
                    |s| s.bright_yellow()
                )
            )?;
        }
        Ok(())
    }

    fn write_contract(
        &self,
        out: &mut impl Write,
        contract: &ContractAnalysis,
        format: OutputFormat,
    ) -> fmt::Result {
        writeln!(
            out,
            "\n{}",
            self.paint(&format!("📄 Contract: {}", contract.name), |s| s.bright_cyan().bold())
        )?;
        writeln!(
            out,
            "{}",
            self.paint(
                &format!(
                    "Functions: {} | Lines: {}",
                    contract.functions.len(),
                    contract.total_lines
                ),
                |s| s.dimmed()
            )
        )?;

        if contract.gas_data_available {
            writeln!(out, "{}", self.paint("✅ Real gas data available", |s| s.bright_green()))?;
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!("Total gas usage: {}", thousands(contract.total_gas_usage)),
                    |s| s.dimmed()
                )
            )?;
            if contract.total_potential_savings > 0 {
                writeln!(
                    out,
                    "{}",
                    self.paint(
                        &format!(
                            "💰 Potential savings: {} gas",
                            thousands(contract.total_potential_savings)
                        ),
                        |s| s.bright_yellow()
                    )
                )?;
            }
        } else {
            writeln!(
                out,
                "{}",
                self.paint("⚠️  No gas data - static analysis only", |s| s.bright_yellow())
            )?;
        }

        match format {
            OutputFormat::Table => self.write_function_table(out, &contract.functions),
            _ => self.write_function_list(out, &contract.functions),
        }
    }

    fn write_function_list(
        &self,
        out: &mut impl Write,
        functions: &[AnalyzedFunction],
    ) -> fmt::Result {
        for func in functions {
            let gas_info = if func.gas_usage > 0 {
                format!("{} gas ({})", thousands(func.gas_usage), func.gas_rank)
            } else {
                "No gas data".to_string()
            };
            let savings_info = if func.potential_savings > 0 {
                format!(" | Savings: {}", thousands(func.potential_savings))
            } else {
                String::new()
            };

            writeln!(
                out,
                "  📝 {} | {}{}",
                self.paint(&func.function.name, |s| s.bright_white().bold()),
                gas_info,
                savings_info
            )?;
            if !func.suggestions.is_empty() {
                writeln!(
                    out,
                    "{}",
                    self.paint(
                        &format!(
                            "     Suggestions: {} optimization(s) available",
                            func.suggestions.len()
                        ),
                        |s| s.dimmed()
                    )
                )?;
            }
        }
        Ok(())
    }

    fn write_function_table(
        &self,
        out: &mut impl Write,
        functions: &[AnalyzedFunction],
    ) -> fmt::Result {
        let sep = if self.use_color { "│" } else { "|" };
        let rule = if self.use_color { "─" } else { "-" };

        writeln!(
            out,
            "\n{:20} {sep} {:>12} {sep} {:^8} {sep} {:^11} {sep} {:>17}",
            "Function", "Gas Usage", "Rank", "Suggestions", "Potential Savings"
        )?;
        writeln!(out, "{}", self.paint(&rule.repeat(82), |s| s.dimmed()))?;

        for func in functions {
            let gas = if func.gas_usage > 0 {
                thousands(func.gas_usage)
            } else {
                "N/A".to_string()
            };
            let rank = format!("{:^8}", func.gas_rank.as_str());
            let rank = match func.gas_rank {
                GasRank::High => self.paint(&rank, |s| s.bright_red()),
                GasRank::Medium => self.paint(&rank, |s| s.bright_yellow()),
                GasRank::Low => self.paint(&rank, |s| s.bright_green()),
                GasRank::Unknown => self.paint(&rank, |s| s.dimmed()),
            };

            writeln!(
                out,
                "{:20} {sep} {:>12} {sep} {} {sep} {:^11} {sep} {:>17}",
                func.function.name,
                gas,
                rank,
                func.suggestions.len(),
                thousands(func.potential_savings)
            )?;
        }
        Ok(())
    }

    fn write_failures(&self, out: &mut impl Write, failures: &[FileFailure]) -> fmt::Result {
        if failures.is_empty() {
            return Ok(());
        }

        writeln!(out, "\n{}", self.paint("❌ Failed files", |s| s.bright_red().bold()))?;
        for failure in failures {
            writeln!(out, "  {} {}", failure.file, self.paint(&failure.error, |s| s.dimmed()))?;
        }
        Ok(())
    }

    /// Per-function suggestion listing: impact icon (🔥 high, ⚡ medium,
    /// 💡 low), source icon (🤖 generated, 🔧 rule), confidence as a
    /// rounded percentage.
    pub fn render_suggestions(&self, batch: &BatchAnalysis, llm_enabled: bool) -> Result<String> {
        let mut out = String::new();
        self.write_suggestions(&mut out, batch, llm_enabled)?;
        Ok(out)
    }

    fn write_suggestions(
        &self,
        out: &mut impl Write,
        batch: &BatchAnalysis,
        llm_enabled: bool,
    ) -> fmt::Result {
        writeln!(
            out,
            "\n{}",
            self.paint("💡 Gas Guardian - Optimization Suggestions", |s| s.bright_blue().bold())
        )?;
        writeln!(
            out,
            "{}",
            self.paint(
                &format!("LLM enabled: {}", if llm_enabled { "Yes" } else { "No" }),
                |s| s.dimmed()
            )
        )?;

        for contract in &batch.contracts {
            writeln!(
                out,
                "\n{}",
                self.paint(&format!("📄 Analyzing: {}", contract.file), |s| s.bright_cyan())
            )?;

            for func in &contract.functions {
                let function = &func.function;
                writeln!(
                    out,
                    "\n{}",
                    self.paint(&format!("🔍 Function: {}", function.name), |s| s.bright_yellow())
                )?;
                writeln!(
                    out,
                    "{}",
                    self.paint(
                        &format!(
                            "   Visibility: {} | Complexity: {}",
                            function.visibility, function.complexity_score
                        ),
                        |s| s.dimmed()
                    )
                )?;
                if !function.patterns.is_empty() {
                    let kinds: Vec<&str> = function.patterns.iter().map(|p| p.kind.as_str()).collect();
                    writeln!(
                        out,
                        "{}",
                        self.paint(&format!("   Patterns: {}", kinds.join(", ")), |s| s.dimmed())
                    )?;
                }

                if func.suggestions.is_empty() {
                    writeln!(
                        out,
                        "{}",
                        self.paint(
                            "   ✅ No optimization suggestions - function appears optimal",
                            |s| s.bright_green()
                        )
                    )?;
                    continue;
                }

                for suggestion in &func.suggestions {
                    writeln!(
                        out,
                        "   {} {} {}",
                        impact_icon(suggestion.impact),
                        source_icon(suggestion.source),
                        suggestion.message
                    )?;
                    writeln!(
                        out,
                        "{}",
                        self.paint(
                            &format!(
                                "      Impact: {} | Confidence: {}%",
                                suggestion.impact,
                                (suggestion.confidence * 100.0).round() as u32
                            ),
                            |s| s.dimmed()
                        )
                    )?;
                }
            }
        }

        self.write_failures(out, &batch.failures)?;
        writeln!(out, "\n{}", self.paint("✅ Analysis complete!", |s| s.bright_green()))
    }

    /// One line per diagnostic, for stderr.
    pub fn render_diagnostics(&self, batch: &BatchAnalysis) -> Result<String> {
        let mut out = String::new();
        self.write_diagnostics(&mut out, batch)?;
        Ok(out)
    }

    fn write_diagnostics(&self, out: &mut impl Write, batch: &BatchAnalysis) -> fmt::Result {
        for contract in &batch.contracts {
            for diagnostic in &contract.diagnostics {
                writeln!(
                    out,
                    "{} {} [{}] {}",
                    self.paint("⚠️ ", |s| s.bright_yellow()),
                    contract.file,
                    diagnostic.origin,
                    diagnostic.message
                )?;
            }
        }
        Ok(())
    }
}

pub fn render_report(batch: &BatchAnalysis, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(batch)?),
        ReportFormat::Markdown => markdown_report(batch),
    }
}

pub fn markdown_report(batch: &BatchAnalysis) -> Result<String> {
    let mut report = String::new();
    write_markdown(&mut report, batch)?;
    Ok(report)
}

fn write_markdown(report: &mut impl Write, batch: &BatchAnalysis) -> fmt::Result {
    let summary = &batch.summary;
    report.write_str("# Gas Guardian Analysis Report\n\n")?;

    report.write_str("## Summary\n")?;
    writeln!(report, "- **Framework**: {}", framework_label(batch.framework))?;
    writeln!(report, "- **Generated**: {}", batch.timestamp)?;
    writeln!(report, "- **Contracts**: {}", summary.total_contracts)?;
    writeln!(report, "- **Functions**: {}", summary.total_functions)?;
    writeln!(report, "- **Total Gas Usage**: {}", thousands(summary.total_gas_usage))?;
    writeln!(
        report,
        "- **Potential Savings**: {} gas ({}%)\n",
        thousands(summary.total_potential_savings),
        summary.potential_savings_percentage
    )?;

    for contract in &batch.contracts {
        writeln!(report, "## Contract: {}\n", contract.name)?;
        writeln!(report, "- **File**: {}", contract.file)?;
        writeln!(report, "- **Functions**: {}", contract.functions.len())?;
        writeln!(report, "- **Lines**: {}", contract.total_lines)?;
        writeln!(
            report,
            "- **Gas Data Available**: {}\n",
            if contract.gas_data_available { "Yes" } else { "No" }
        )?;

        if contract.functions.is_empty() {
            continue;
        }

        report.write_str("### Functions\n\n")?;
        report.write_str("| Function | Gas Usage | Rank | Suggestions | Potential Savings |\n")?;
        report.write_str("|----------|-----------|------|-------------|-------------------|\n")?;
        for func in &contract.functions {
            let gas = if func.gas_usage > 0 {
                thousands(func.gas_usage)
            } else {
                "N/A".to_string()
            };
            writeln!(
                report,
                "| {} | {} | {} | {} | {} |",
                func.function.name,
                gas,
                func.gas_rank,
                func.suggestions.len(),
                thousands(func.potential_savings)
            )?;
        }
        report.write_char('\n')?;

        let top: Vec<_> = contract
            .functions
            .iter()
            .filter_map(|f| f.suggestions.first().map(|s| (&f.function.name, s)))
            .collect();
        if !top.is_empty() {
            report.write_str("### Top Suggestions\n\n")?;
            for (name, suggestion) in top {
                writeln!(
                    report,
                    "- `{}` ({} impact): {}",
                    name, suggestion.impact, suggestion.message
                )?;
            }
            report.write_char('\n')?;
        }
    }

    if !batch.failures.is_empty() {
        report.write_str("## Failed Files\n\n")?;
        for failure in &batch.failures {
            writeln!(report, "- {}: {}", failure.file, failure.error)?;
        }
        report.write_char('\n')?;
    }

    Ok(())
}

fn framework_label(framework: Option<Framework>) -> &'static str {
    framework.map_or("none", |f| f.as_str())
}

fn impact_icon(impact: Impact) -> &'static str {
    match impact {
        Impact::High => "🔥",
        Impact::Medium => "⚡",
        Impact::Low => "💡",
    }
}

fn source_icon(source: SuggestionSource) -> &'static str {
    match source {
        SuggestionSource::Llm => "🤖",
        SuggestionSource::Static => "🔧",
    }
}

/// `1234567` → `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> Function {
        Function {
            name: name.to_string(),
            visibility: Visibility::Public,
            state_mutability: StateMutability::Nonpayable,
            parameters: Vec::new(),
            returns: None,
            modifiers: Vec::new(),
            patterns: Vec::new(),
            source_code: String::new(),
            start_line: 1,
            complexity_score: 1,
        }
    }

    fn batch() -> BatchAnalysis {
        let transfer = AnalyzedFunction {
            function: function("transfer"),
            gas_usage: 133_128,
            gas_rank: GasRank::High,
            has_gas_data: true,
            suggestions: vec![
                Suggestion::from_rule(
                    "storage.batch_writes",
                    SuggestionKind::Storage,
                    "Batch storage writes.",
                    0.8,
                    Impact::High,
                    20_000,
                ),
                Suggestion::generated("Cache balances in memory.", 0.86, Impact::Medium),
            ],
            potential_savings: 30_618,
        };
        let get = AnalyzedFunction {
            function: function("getValue"),
            gas_usage: 0,
            gas_rank: GasRank::Unknown,
            has_gas_data: false,
            suggestions: Vec::new(),
            potential_savings: 0,
        };

        BatchAnalysis {
            contracts: vec![ContractAnalysis {
                name: "Token".to_string(),
                file: "Token.sol".to_string(),
                functions: vec![transfer, get],
                state_variables: vec!["balances".to_string()],
                total_lines: 42,
                total_gas_usage: 133_128,
                total_potential_savings: 30_618,
                gas_data_available: true,
                framework: Some(Framework::Foundry),
                diagnostics: vec![Diagnostic::new("llm", "getValue: Timeout after 30 seconds")],
            }],
            failures: vec![FileFailure {
                file: "Missing.sol".to_string(),
                error: "File not found: Missing.sol".to_string(),
            }],
            summary: AnalysisSummary {
                total_contracts: 1,
                total_functions: 2,
                total_gas_usage: 133_128,
                total_potential_savings: 30_618,
                contracts_with_gas_data: 1,
                gas_data_coverage: 100,
                average_gas_per_function: 66_564,
                potential_savings_percentage: 23,
            },
            framework: Some(Framework::Foundry),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_thousands_separator() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000), "1,000");
        assert_eq!(thousands(133_128), "133,128");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_list_output() {
        let out = Reporter::new(false)
            .render_analysis(&batch(), OutputFormat::List)
            .unwrap();

        assert!(out.contains("Framework: foundry"));
        assert!(out.contains("Contracts: 1 | Functions: 2"));
        assert!(out.contains("💰 Potential Savings: 30,618 gas (23%)"));
        assert!(out.contains("📝 transfer | 133,128 gas (high) | Savings: 30,618"));
        assert!(out.contains("📝 getValue | No gas data"));
        assert!(out.contains("Suggestions: 2 optimization(s) available"));
        assert!(out.contains("Missing.sol"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_table_output() {
        let out = Reporter::new(false)
            .render_analysis(&batch(), OutputFormat::Table)
            .unwrap();

        let row = out.lines().find(|l| l.starts_with("transfer")).unwrap();
        assert!(row.contains("133,128"));
        assert!(row.contains("high"));
        assert!(out.lines().any(|l| l.starts_with("getValue") && l.contains("N/A")));
    }

    #[test]
    fn test_json_output_is_the_batch() {
        let out = Reporter::new(true)
            .render_analysis(&batch(), OutputFormat::Json)
            .unwrap();

        let parsed: BatchAnalysis = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.summary, batch().summary);
        assert_eq!(parsed.contracts[0].functions.len(), 2);
        assert_eq!(parsed.failures[0].file, "Missing.sol");
    }

    #[test]
    fn test_no_gas_summary_warns() {
        let mut batch = batch();
        batch.summary.total_gas_usage = 0;

        let out = Reporter::new(false)
            .render_analysis(&batch, OutputFormat::List)
            .unwrap();

        assert!(out.contains("No gas data available - run tests with foundry first"));
    }

    #[test]
    fn test_suggestion_listing() {
        let out = Reporter::new(false).render_suggestions(&batch(), true).unwrap();

        assert!(out.contains("LLM enabled: Yes"));
        assert!(out.contains("🔍 Function: transfer"));
        assert!(out.contains("Visibility: public | Complexity: 1"));
        assert!(out.contains("🔥 🔧 Batch storage writes."));
        assert!(out.contains("⚡ 🤖 Cache balances in memory."));
        assert!(out.contains("Impact: medium | Confidence: 86%"));
        assert!(out.contains("function appears optimal"));
    }

    #[test]
    fn test_diagnostics_render() {
        let out = Reporter::new(false).render_diagnostics(&batch()).unwrap();

        assert!(out.contains("Token.sol [llm] getValue: Timeout after 30 seconds"));
    }

    #[test]
    fn test_markdown_report() {
        let report = render_report(&batch(), ReportFormat::Markdown).unwrap();

        assert!(report.starts_with("# Gas Guardian Analysis Report\n\n## Summary\n"));
        assert!(report.contains("- **Framework**: foundry"));
        assert!(report.contains("- **Potential Savings**: 30,618 gas (23%)"));
        assert!(report.contains("## Contract: Token"));
        assert!(report.contains("- **Gas Data Available**: Yes"));
        assert!(report.contains("| transfer | 133,128 | high | 2 | 30,618 |"));
        assert!(report.contains("| getValue | N/A | unknown | 0 | 0 |"));
        assert!(report.contains("- `transfer` (high impact): Batch storage writes."));
        assert!(report.contains("- Missing.sol: File not found: Missing.sol"));
    }

    /// Accepts `limit` bytes, then refuses every write.
    struct FullSink {
        written: String,
        limit: usize,
    }

    impl Write for FullSink {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if self.written.len() + s.len() > self.limit {
                return Err(fmt::Error);
            }
            self.written.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn test_write_errors_propagate() {
        let reporter = Reporter::new(false);
        let batch = batch();
        let sink = |limit| FullSink {
            written: String::new(),
            limit,
        };

        assert!(reporter
            .write_analysis(&mut sink(64), &batch, OutputFormat::List)
            .is_err());
        assert!(reporter
            .write_analysis(&mut sink(64), &batch, OutputFormat::Table)
            .is_err());
        assert!(reporter.write_suggestions(&mut sink(64), &batch, false).is_err());
        assert!(reporter.write_diagnostics(&mut sink(8), &batch).is_err());
        assert!(write_markdown(&mut sink(64), &batch).is_err());

        let mut roomy = sink(usize::MAX);
        reporter.write_diagnostics(&mut roomy, &batch).unwrap();
        assert_eq!(roomy.written, reporter.render_diagnostics(&batch).unwrap());
    }

    #[test]
    fn test_json_report() {
        let report = render_report(&batch(), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();

        assert_eq!(value["summary"]["total_functions"], 2);
        assert_eq!(value["contracts"][0]["functions"][0]["name"], "transfer");
    }
}
