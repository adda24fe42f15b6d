// src/llm/parse.rs
//! Prompt construction and free-text output parsing.

use regex::Regex;
use std::sync::LazyLock;

use super::FunctionMetadata;
use crate::types::{Impact, Suggestion};

/// Prompt kind used as the cache key prefix.
pub const OPTIMIZATION_PROMPT: &str = "optimization";

pub const SYSTEM_PROMPT: &str = "You are a Solidity gas optimization assistant. Answer with a short numbered list of concrete optimizations, one per line.";

const SNIPPET_LIMIT: usize = 120;
const MAX_SUGGESTIONS: usize = 3;
const GENERATED_CONFIDENCE: f64 = 0.8;

const GAS_KEYWORDS: &[&str] = &[
    "unchecked", "external", "storage", "memory", "calldata", "gas", "sstore", "sload", "mapping",
    "array", "uint", "require", "error", "batch", "pack", "slot", "optimize",
];

// Lines that echo the prompt back.
const PROMPT_ECHOES: &[&str] = &[
    "Optimize this Solidity",
    "Function:",
    "Issues:",
    "Gas optimizations:",
];

static PREAMBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^.*?gas optimizations:\s*").unwrap());

static NUMBERING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*").unwrap());

static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[*-]\s*").unwrap());

static LEADING_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:use|consider|try|implement)\s+").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn build_prompt(function_text: &str, metadata: &FunctionMetadata) -> String {
    let clean = WHITESPACE.replace_all(function_text, " ");
    let clean = clean.trim();
    let snippet = if clean.chars().count() > SNIPPET_LIMIT {
        let cut: String = clean.chars().take(SNIPPET_LIMIT).collect();
        format!("{cut}...")
    } else {
        clean.to_string()
    };

    let issues = if metadata.patterns.is_empty() {
        "none".to_string()
    } else {
        metadata
            .patterns
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Optimize this Solidity function for gas efficiency:\n\n{snippet}\n\nFunction: {}\nIssues: {issues}\n\nGas optimizations:\n1.",
        metadata.name
    )
}

/// Extracts at most three suggestions from model output, or the canned
/// fallback when no line qualifies.
pub fn parse_output(output: &str) -> Vec<Suggestion> {
    let body = PREAMBLE.replace(output, "");

    let suggestions: Vec<Suggestion> = body
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() >= 15)
        .filter(|line| !PROMPT_ECHOES.iter().any(|echo| line.contains(echo)))
        .filter(|line| is_gas_advice(line))
        .map(|line| {
            let message = clean_line(line);
            let impact = estimate_impact(&message);
            Suggestion::generated(message, GENERATED_CONFIDENCE, impact)
        })
        .take(MAX_SUGGESTIONS)
        .collect();

    if suggestions.is_empty() {
        fallback_suggestions()
    } else {
        suggestions
    }
}

/// Mentions a Solidity/gas keyword and is between 21 and 149 characters.
pub fn is_gas_advice(line: &str) -> bool {
    let len = line.chars().count();
    let lower = line.to_lowercase();
    len > 20 && len < 150 && GAS_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Drops numbering, bullets and a leading imperative verb, capitalises and
/// terminates the sentence.
pub fn clean_line(line: &str) -> String {
    let line = NUMBERING.replace(line, "");
    let line = BULLET.replace(&line, "");
    let line = LEADING_VERB.replace(&line, "");

    let mut chars = line.chars();
    let mut cleaned = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    if !cleaned.ends_with('.') && !cleaned.ends_with('!') {
        cleaned.push('.');
    }
    cleaned.trim().to_string()
}

pub fn estimate_impact(message: &str) -> Impact {
    let lower = message.to_lowercase();
    if ["storage", "sstore", "struct"].iter().any(|k| lower.contains(k)) {
        Impact::High
    } else if ["loop", "unchecked", "memory"].iter().any(|k| lower.contains(k)) {
        Impact::Medium
    } else {
        Impact::Low
    }
}

pub fn fallback_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::generated(
            "Use external visibility instead of public for functions not called internally (~24 gas savings)",
            0.8,
            Impact::Low,
        ),
        Suggestion::generated(
            "Cache storage reads in memory variables to avoid multiple SLOAD operations (~2100 gas per read)",
            0.9,
            Impact::Medium,
        ),
        Suggestion::generated(
            "Consider using unchecked arithmetic for operations that cannot overflow (~20 gas savings)",
            0.7,
            Impact::Medium,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatternKind, SuggestionSource};

    fn metadata() -> FunctionMetadata {
        FunctionMetadata {
            name: "batchTransfer".to_string(),
            patterns: vec![PatternKind::Loop, PatternKind::StorageWrite],
        }
    }

    #[test]
    fn test_prompt_collapses_and_truncates_code() {
        let code = format!("function f() public {{\n    {}\n}}", "x = 1; ".repeat(40));

        let prompt = build_prompt(&code, &metadata());

        assert!(prompt.starts_with("Optimize this Solidity function for gas efficiency:"));
        assert!(prompt.contains("Function: batchTransfer"));
        assert!(prompt.contains("Issues: loop, storage_write"));
        assert!(prompt.ends_with("Gas optimizations:\n1."));
        assert!(prompt.contains("..."));
        assert!(!prompt.contains("{\n"));
    }

    #[test]
    fn test_prompt_without_patterns() {
        let meta = FunctionMetadata {
            name: "f".to_string(),
            patterns: vec![],
        };

        assert!(build_prompt("function f() {}", &meta).contains("Issues: none"));
    }

    #[test]
    fn test_parse_keeps_relevant_lines_and_cleans_them() {
        let output = "Optimize this Solidity function...\nGas optimizations:\n1. use calldata for array parameters\n2. Pack the struct into a single storage slot\n3. I like turtles very much indeed\n- cache the loop bound in a memory variable";

        let suggestions = parse_output(output);

        let messages: Vec<_> = suggestions.iter().map(|s| s.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Calldata for array parameters.",
                "Pack the struct into a single storage slot.",
                "Cache the loop bound in a memory variable.",
            ]
        );
        assert_eq!(suggestions[0].impact, Impact::Low);
        assert_eq!(suggestions[1].impact, Impact::High);
        assert_eq!(suggestions[2].impact, Impact::Medium);
        assert!(suggestions.iter().all(|s| s.confidence == 0.8));
        assert!(suggestions.iter().all(|s| s.source == SuggestionSource::Llm));
    }

    #[test]
    fn test_parse_caps_at_three() {
        let output = (1..=6)
            .map(|i| format!("{i}. Reduce gas by packing slot number {i} tightly"))
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(parse_output(&output).len(), 3);
    }

    #[test]
    fn test_unusable_output_falls_back() {
        let suggestions = parse_output("Gas optimizations:\n1. hello\n2. nothing relevant in this sentence at all");

        assert_eq!(suggestions, fallback_suggestions());
        assert_eq!(suggestions.len(), 3);
    }

    #[test]
    fn test_length_window() {
        assert!(!is_gas_advice("gas gas gas"));
        assert!(is_gas_advice("Optimize the storage slots."));
        assert!(!is_gas_advice(&format!("gas {}", "x".repeat(150))));
    }

    #[test]
    fn test_clean_line_keeps_terminal_punctuation() {
        assert_eq!(clean_line("3. Try unchecked math!"), "Unchecked math!");
        assert_eq!(clean_line("* Implement batching."), "Batching.");
    }
}
