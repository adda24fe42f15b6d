use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lowercase function name → measured gas, as reported by a test framework.
pub type GasData = HashMap<String, u64>;

/// Contract name used when a declaration keyword is present but no name follows it.
pub const UNKNOWN_CONTRACT: &str = "Unknown";

/// Contract name used when the text has no `contract`, `interface` or `library` at all.
pub const INVALID_CONTRACT: &str = "InvalidContract";

/// Structural model of one Solidity source file.
///
/// Built fresh by every parse call and never mutated afterwards; the
/// cost-integration step wraps it instead of changing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Name of the first declared contract/interface/library (or a sentinel)
    pub name: String,
    /// Functions in order of textual appearance
    pub functions: Vec<Function>,
    /// Unique state variable names in first-seen order
    pub state_variables: Vec<String>,
    /// Line count of the literal input text
    pub total_lines: usize,
}

impl Contract {
    /// The degraded contract returned for text that is not Solidity.
    pub fn invalid(total_lines: usize) -> Self {
        Self {
            name: INVALID_CONTRACT.to_string(),
            functions: Vec::new(),
            state_variables: Vec::new(),
            total_lines,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.name == INVALID_CONTRACT
    }
}

/// Declared access qualifier of a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Internal,
    External,
}

impl Visibility {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared side-effect qualifier of a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    Payable,
    #[default]
    Nonpayable,
}

impl StateMutability {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "pure" => Some(Self::Pure),
            "view" => Some(Self::View),
            "payable" => Some(Self::Payable),
            "nonpayable" => Some(Self::Nonpayable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pure => "pure",
            Self::View => "view",
            Self::Payable => "payable",
            Self::Nonpayable => "nonpayable",
        }
    }
}

impl fmt::Display for StateMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `type name` entry of a parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Declared type, including array brackets (e.g. `address[]`)
    #[serde(rename = "type")]
    pub ty: String,
    /// Parameter identifier
    pub name: String,
}

/// One function recovered from the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function identifier
    pub name: String,
    /// Declared visibility (`public` when omitted)
    pub visibility: Visibility,
    /// Declared mutability (`nonpayable` when omitted)
    pub state_mutability: StateMutability,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Raw text of the `returns (...)` clause, if any
    pub returns: Option<String>,
    /// Additional qualifier words such as `virtual` or `override`
    pub modifiers: Vec<String>,
    /// Structural patterns detected in the function text
    pub patterns: Vec<Pattern>,
    /// Exact source from the `function` keyword through the closing brace
    pub source_code: String,
    /// 1-based line of the `function` keyword
    pub start_line: usize,
    /// `1 + 2 × patterns.len()`
    pub complexity_score: u32,
}

impl Function {
    pub fn has_pattern(&self, kind: PatternKind) -> bool {
        self.patterns.iter().any(|p| p.kind == kind)
    }

    pub fn pattern(&self, kind: PatternKind) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.kind == kind)
    }

    pub fn complexity_for(patterns: &[Pattern]) -> u32 {
        1 + 2 * patterns.len() as u32
    }
}

/// Kind of structural pattern detected in a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Loop,
    StorageWrite,
    ExternalCall,
    Validation,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::StorageWrite => "storage_write",
            Self::ExternalCall => "external_call",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code shape used as evidence for suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub description: String,
    /// Heuristic gas estimate (scaled by `occurrences` for counted kinds)
    pub estimated_gas: u64,
    pub suggestion: String,
    /// How many textual occurrences were counted (1 for presence-only kinds)
    pub occurrences: usize,
}

/// Category of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Storage,
    Loop,
    Visibility,
    Mutability,
    Arithmetic,
    String,
    Array,
    Types,
    Constants,
    Variables,
    ControlFlow,
    Security,
    Events,
    Patterns,
    Assembly,
    AiGenerated,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Loop => "loop",
            Self::Visibility => "visibility",
            Self::Mutability => "mutability",
            Self::Arithmetic => "arithmetic",
            Self::String => "string",
            Self::Array => "array",
            Self::Types => "types",
            Self::Constants => "constants",
            Self::Variables => "variables",
            Self::ControlFlow => "control_flow",
            Self::Security => "security",
            Self::Events => "events",
            Self::Patterns => "patterns",
            Self::Assembly => "assembly",
            Self::AiGenerated => "ai_generated",
        }
    }
}

/// Expected effect tier of applying a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// Multiplier used when ranking suggestions.
    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 3.0,
            Self::Medium => 2.0,
            Self::Low => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Static,
    Llm,
}

/// A single actionable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Category of the recommendation
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    /// Human-readable recommendation
    pub message: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Expected effect tier
    pub impact: Impact,
    /// Static rule or generative provider
    pub source: SuggestionSource,
    /// Estimated gas saved if applied (0 when not estimable)
    #[serde(default)]
    pub estimated_saving: u64,
    /// Identifier of the static rule that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Suggestion {
    /// Builds a static-rule suggestion.
    pub fn from_rule(
        rule: &str,
        kind: SuggestionKind,
        message: impl Into<String>,
        confidence: f64,
        impact: Impact,
        estimated_saving: u64,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            confidence,
            impact,
            source: SuggestionSource::Static,
            estimated_saving,
            rule: Some(rule.to_string()),
        }
    }

    /// Builds a suggestion produced by a generative provider.
    pub fn generated(message: impl Into<String>, confidence: f64, impact: Impact) -> Self {
        Self {
            kind: SuggestionKind::AiGenerated,
            message: message.into(),
            confidence,
            impact,
            source: SuggestionSource::Llm,
            estimated_saving: 0,
            rule: None,
        }
    }

    /// Ranking score: impact weight × confidence.
    pub fn score(&self) -> f64 {
        self.impact.weight() * self.confidence
    }
}

/// Measured-cost bucket for a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasRank {
    Unknown,
    Low,
    Medium,
    High,
}

impl GasRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for GasRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test framework that supplies measured gas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Foundry,
    Hardhat,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foundry => "foundry",
            Self::Hardhat => "hardhat",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function together with its measured cost and ranked suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedFunction {
    #[serde(flatten)]
    pub function: Function,
    /// Measured gas (0 when unknown)
    pub gas_usage: u64,
    pub gas_rank: GasRank,
    pub has_gas_data: bool,
    /// Ranked, de-duplicated suggestions
    pub suggestions: Vec<Suggestion>,
    /// Estimated gas that applying every suggestion would save
    pub potential_savings: u64,
}

/// Non-fatal problem recorded while analyzing a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Component that raised it ("parser", "gas-data", "llm")
    pub origin: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(origin: &str, message: impl Into<String>) -> Self {
        Self {
            origin: origin.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level result of analyzing one contract file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAnalysis {
    pub name: String,
    /// Path of the analyzed file, as given by the caller
    pub file: String,
    pub functions: Vec<AnalyzedFunction>,
    pub state_variables: Vec<String>,
    pub total_lines: usize,
    pub total_gas_usage: u64,
    pub total_potential_savings: u64,
    /// `true` iff `total_gas_usage > 0`
    pub gas_data_available: bool,
    pub framework: Option<Framework>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ContractAnalysis {
    /// Number of functions that received a measured cost.
    pub fn functions_with_gas_data(&self) -> usize {
        self.functions.iter().filter(|f| f.has_gas_data).count()
    }
}

/// A file that could not be analyzed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

/// Aggregate statistics over a batch of contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_contracts: usize,
    pub total_functions: usize,
    pub total_gas_usage: u64,
    pub total_potential_savings: u64,
    pub contracts_with_gas_data: usize,
    /// Rounded percentage of contracts that have gas data
    pub gas_data_coverage: u64,
    /// Rounded mean gas over all functions
    pub average_gas_per_function: u64,
    /// Rounded potential savings as a percentage of total gas
    pub potential_savings_percentage: u64,
}

/// Result of analyzing several files in one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysis {
    pub contracts: Vec<ContractAnalysis>,
    pub failures: Vec<FileFailure>,
    pub summary: AnalysisSummary,
    pub framework: Option<Framework>,
    /// RFC 3339 time the batch finished
    pub timestamp: String,
}
