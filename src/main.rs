use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use gas_guardian::adapters;
use gas_guardian::llm::{OpenAiProvider, SuggestionCache};
use gas_guardian::parser::ParserKind;
use gas_guardian::reporter::{self, OutputFormat, ReportFormat, Reporter};
use gas_guardian::types::{BatchAnalysis, Framework};
use gas_guardian::{Analyzer, GuardConfig};

/// Command-line interface for Gas Guardian, a Solidity gas optimization advisor.
///
/// Subcommands:
///   analyze → suggestions joined with measured gas, per contract
///   suggest → per-function suggestion listing
///   report  → markdown or JSON report
#[derive(Parser)]
#[command(name = "gas-guardian")]
#[command(about = "⛽ Gas Guardian - Find and rank gas optimizations in Solidity contracts")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./gas-guardian.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Disable colored terminal output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🔍 Analyze contracts against gas measured by the test framework.
    #[command(alias = "a")]
    Analyze {
        /// Solidity files to analyze
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Test framework that provides gas measurements
        #[arg(short, long, value_enum)]
        framework: Option<Framework>,

        /// Output layout
        #[arg(short, long, value_enum, default_value_t = OutputFormat::List)]
        output: OutputFormat,

        /// Ask the generative provider for extra suggestions
        #[arg(long)]
        llm: bool,

        /// Parser implementation
        #[arg(long, value_enum)]
        parser: Option<ParserKind>,
    },

    /// 💡 List optimization suggestions for every function.
    #[command(alias = "s")]
    Suggest {
        /// Solidity files to inspect
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Ask the generative provider for extra suggestions
        #[arg(long)]
        llm: bool,

        /// Parser implementation
        #[arg(long, value_enum)]
        parser: Option<ParserKind>,
    },

    /// 📊 Write a markdown or JSON report.
    #[command(alias = "r")]
    Report {
        /// Solidity files to include
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Test framework that provides gas measurements
        #[arg(short, long, value_enum)]
        framework: Option<Framework>,

        /// Ask the generative provider for extra suggestions
        #[arg(long)]
        llm: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if cli.no_color {
        colored::control::set_override(false);
    }
    let use_color = !cli.no_color;
    let mut config = GuardConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Analyze {
            files,
            framework,
            output,
            llm,
            parser,
        } => {
            apply_overrides(&mut config, framework, parser, llm);
            let analyzer = build_analyzer(&config, true)?;

            if output != OutputFormat::Json {
                print_header("🔍 Gas Guardian - Contract Analysis", &config, &files, use_color);
            }

            let batch = analyzer.analyze_files(&files).await;
            let reporter = Reporter::new(use_color);
            print!("{}", reporter.render_analysis(&batch, output)?);
            eprint!("{}", reporter.render_diagnostics(&batch)?);

            check_any_succeeded(&batch)
        }

        Commands::Suggest { files, llm, parser } => {
            apply_overrides(&mut config, None, parser, llm);
            let analyzer = build_analyzer(&config, false)?;

            let batch = analyzer.analyze_files(&files).await;
            let reporter = Reporter::new(use_color);
            print!("{}", reporter.render_suggestions(&batch, config.llm.enabled)?);
            eprint!("{}", reporter.render_diagnostics(&batch)?);

            check_any_succeeded(&batch)
        }

        Commands::Report {
            files,
            format,
            output,
            framework,
            llm,
        } => {
            apply_overrides(&mut config, framework, None, llm);
            let analyzer = build_analyzer(&config, true)?;

            let batch = analyzer.analyze_files(&files).await;
            let report = reporter::render_report(&batch, format)?;
            eprint!("{}", Reporter::new(use_color).render_diagnostics(&batch)?);

            match output {
                Some(path) => {
                    fs::write(&path, &report)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    if use_color {
                        println!("{} {}", "✅ Report saved to".bright_green(), path.display());
                    } else {
                        println!("Report saved to {}", path.display());
                    }
                }
                None => print!("{}", report),
            }

            check_any_succeeded(&batch)
        }
    }
}

/// `warn` by default, `debug` for this crate with `--debug`; `RUST_LOG`
/// wins over both.
fn init_logging(debug: bool) {
    let default = if debug { "warn,gas_guardian=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn apply_overrides(
    config: &mut GuardConfig,
    framework: Option<Framework>,
    parser: Option<ParserKind>,
    llm: bool,
) {
    if let Some(framework) = framework {
        config.framework = framework;
    }
    if let Some(parser) = parser {
        config.parser = parser;
    }
    if llm {
        config.llm.enabled = true;
    }
}

fn build_analyzer(config: &GuardConfig, with_gas: bool) -> Result<Analyzer> {
    let mut analyzer = Analyzer::new(config);

    if with_gas {
        let root = std::env::current_dir().context("Failed to read the working directory")?;
        analyzer = analyzer.with_gas_provider(adapters::for_framework(
            config.framework,
            root,
            config.gas.run_tool,
        ));
    }

    if config.llm.enabled {
        let ttl = Duration::from_secs(config.llm.cache_ttl_hours * 3600);
        let cache = match config.llm.resolved_cache_dir() {
            Some(dir) => SuggestionCache::with_dir(ttl, dir),
            None => SuggestionCache::in_memory(ttl),
        };
        let provider = OpenAiProvider::new(&config.llm, cache)
            .context("Failed to set up the suggestion provider")?;
        analyzer = analyzer.with_suggestion_provider(Box::new(provider));
    }

    Ok(analyzer)
}

fn print_header(title: &str, config: &GuardConfig, files: &[PathBuf], use_color: bool) {
    let files = files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    if use_color {
        println!("{}", title.bright_blue().bold());
        println!("{}", format!("Framework: {}", config.framework).dimmed());
        println!("{}", format!("Files: {}", files).dimmed());
    } else {
        println!("{}", title);
        println!("Framework: {}", config.framework);
        println!("Files: {}", files);
    }
}

/// Fails only when no input could be analyzed.
fn check_any_succeeded(batch: &BatchAnalysis) -> Result<()> {
    if batch.contracts.is_empty() && !batch.failures.is_empty() {
        anyhow::bail!("All {} input file(s) failed to analyze", batch.failures.len());
    }
    Ok(())
}
