// src/rules.rs
//! Static gas rules.
//!
//! Each rule is a small textual predicate over one function's source plus
//! its detected patterns. Rules are independent: they never see each other's
//! output, and the engine keeps no state between calls.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::RulesConfig;
use crate::types::*;

/// Every rule id the engine can emit, in evaluation order.
pub const RULE_IDS: &[&str] = &[
    "storage.batch_writes",
    "storage.single_write",
    "storage.cache_reads",
    "storage.struct_packing",
    "storage.default_init",
    "loop.general",
    "loop.cache_length",
    "loop.unchecked_increment",
    "loop.nested",
    "visibility.external",
    "visibility.calldata",
    "mutability.view_or_pure",
    "arithmetic.division",
    "arithmetic.modulo",
    "string.concat",
    "array.dynamic",
    "types.small_uint",
    "constants.unchanging",
    "variables.loop_counter_init",
    "control_flow.require_count",
    "control_flow.short_circuit",
    "control_flow.if_chain",
    "security.reentrancy",
    "events.string_payload",
    "patterns.getter",
    "assembly.hashing",
];

static ASSIGNMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\s*=\s*[^=!<>]|\w+\[\w*\]\s*=").unwrap());

static INDEXED_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\[[\w\s]*\]").unwrap());

static DEFAULT_VALUE_INIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\w+\s*=\s*(?:0[^x\w]|false|"")"#).unwrap());

static NESTED_LOOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"for\s*\([^}]*for\s*\(").unwrap());

static LITERAL_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b(\w+)\s*=\s*[\d"'][^;]*;"#).unwrap());

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"require\s*\(").unwrap());

static ELSE_IF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\belse\s+if\b").unwrap());

static STATE_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\w+\s*=\s*[^=!<>]|\w+\[\w*\]\s*=|emit\s+\w+|\.transfer\(|\.call\(|\.delegatecall\(|\.send\(|selfdestruct\(|require\(|assert\(|revert\(|delete\s+\w+|\.push\(|\.pop\(",
    )
    .unwrap()
});

static STATE_READ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bmsg\.|\btx\.|\bblock\.|\baddress\(this\)|\bbalance|\w+\[\w*\]|\w+\.call|keccak256\(|ecrecover\(",
    )
    .unwrap()
});

/// Maps a parsed function to static suggestions.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: RulesConfig,
}

/// Collects suggestions while applying per-rule configuration.
struct Findings<'a> {
    config: &'a RulesConfig,
    suggestions: Vec<Suggestion>,
}

impl Findings<'_> {
    fn push(
        &mut self,
        rule: &str,
        kind: SuggestionKind,
        message: &str,
        confidence: f64,
        impact: Impact,
        estimated_saving: u64,
    ) {
        if self.config.is_disabled(rule) {
            return;
        }
        let confidence = self.config.confidence_for(rule, confidence);
        self.suggestions.push(Suggestion::from_rule(
            rule,
            kind,
            message,
            confidence,
            impact,
            estimated_saving,
        ));
    }
}

impl RuleEngine {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// Runs every enabled rule against `function`. Deterministic and total.
    pub fn analyze(&self, function: &Function) -> Vec<Suggestion> {
        let code = function.source_code.as_str();
        let mut findings = Findings {
            config: &self.config,
            suggestions: Vec::new(),
        };

        self.storage_rules(function, code, &mut findings);
        self.loop_rules(function, code, &mut findings);
        self.visibility_rules(function, code, &mut findings);
        self.mutability_rules(function, code, &mut findings);
        self.expensive_operation_rules(code, &mut findings);
        self.variable_rules(code, &mut findings);
        self.control_flow_rules(code, &mut findings);
        self.advanced_rules(function, code, &mut findings);

        findings.suggestions
    }

    fn storage_rules(&self, function: &Function, code: &str, out: &mut Findings) {
        if let Some(pattern) = function.pattern(PatternKind::StorageWrite) {
            let writes = ASSIGNMENTS.find_iter(code).count() as u64;
            if writes > 3 {
                out.push(
                    "storage.batch_writes",
                    SuggestionKind::Storage,
                    "Multiple storage writes detected. Consider batching operations or using memory for intermediate calculations.",
                    0.8,
                    Impact::High,
                    writes * 5_000,
                );
            } else {
                out.push(
                    "storage.single_write",
                    SuggestionKind::Storage,
                    "Storage write detected. Skip writes that leave the stored value unchanged and keep intermediate results in memory.",
                    0.5,
                    Impact::Medium,
                    pattern.occurrences as u64 * 2_900,
                );
            }
        }

        let reads = INDEXED_ACCESS.find_iter(code).count() as u64;
        if reads > 2 {
            out.push(
                "storage.cache_reads",
                SuggestionKind::Storage,
                "Multiple storage reads detected. Cache storage values in memory variables.",
                0.7,
                Impact::Medium,
                (reads - 1) * 2_100,
            );
        }

        if code.contains("struct") && code.contains("uint256") {
            out.push(
                "storage.struct_packing",
                SuggestionKind::Storage,
                "Consider packing struct variables to use fewer storage slots (uint128 instead of uint256 when possible).",
                0.6,
                Impact::High,
                20_000,
            );
        }

        if DEFAULT_VALUE_INIT.is_match(code) {
            out.push(
                "storage.default_init",
                SuggestionKind::Storage,
                "Avoid explicit initialization to default values (0, false, \"\") to save gas.",
                0.9,
                Impact::Low,
                2_000,
            );
        }
    }

    fn loop_rules(&self, function: &Function, code: &str, out: &mut Findings) {
        if !function.has_pattern(PatternKind::Loop) {
            return;
        }

        out.push(
            "loop.general",
            SuggestionKind::Loop,
            "Loop detected. Consider using unchecked arithmetic for counters and caching array length.",
            0.9,
            Impact::Medium,
            5_000,
        );

        if code.contains(".length") && (code.contains("for") || code.contains("while")) {
            out.push(
                "loop.cache_length",
                SuggestionKind::Loop,
                "Cache array length before loop: uint256 len = array.length; for(uint256 i = 0; i < len;)",
                0.85,
                Impact::Medium,
                3_000,
            );
        }

        if code.contains("++") || code.contains("i + 1") {
            out.push(
                "loop.unchecked_increment",
                SuggestionKind::Loop,
                "Use unchecked{++i} for loop increments when overflow is impossible.",
                0.9,
                Impact::Medium,
                2_500,
            );
        }

        if NESTED_LOOP.is_match(code) {
            out.push(
                "loop.nested",
                SuggestionKind::Loop,
                "Nested loops detected. Consider alternative algorithms or breaking into separate functions.",
                0.7,
                Impact::High,
                10_000,
            );
        }
    }

    fn visibility_rules(&self, function: &Function, code: &str, out: &mut Findings) {
        if function.visibility == Visibility::Public && !is_called_internally(code, &function.name)
        {
            out.push(
                "visibility.external",
                SuggestionKind::Visibility,
                "Consider using \"external\" instead of \"public\" if function is only called externally.",
                0.6,
                Impact::Low,
                1_000,
            );
        }

        if function.visibility == Visibility::External
            && code.contains("memory")
            && !code.contains("calldata")
        {
            out.push(
                "visibility.calldata",
                SuggestionKind::Visibility,
                "Use \"calldata\" instead of \"memory\" for external function parameters.",
                0.8,
                Impact::Medium,
                3_000,
            );
        }
    }

    fn mutability_rules(&self, function: &Function, code: &str, out: &mut Findings) {
        if function.state_mutability != StateMutability::Nonpayable
            || has_state_changes(code)
            || function.has_pattern(PatternKind::StorageWrite)
        {
            return;
        }

        let message = if is_referentially_pure(code) {
            "Function appears to be pure (no state reading). Consider marking as \"pure\"."
        } else {
            "Function appears to be read-only. Consider marking as \"view\"."
        };
        out.push(
            "mutability.view_or_pure",
            SuggestionKind::Mutability,
            message,
            0.5,
            Impact::Low,
            500,
        );
    }

    fn expensive_operation_rules(&self, code: &str, out: &mut Findings) {
        if code.contains('/') && !code.contains("//") {
            out.push(
                "arithmetic.division",
                SuggestionKind::Arithmetic,
                "Division operations are expensive. Consider using bit shifting for powers of 2.",
                0.6,
                Impact::Medium,
                1_500,
            );
        }

        if code.contains('%') {
            out.push(
                "arithmetic.modulo",
                SuggestionKind::Arithmetic,
                "Modulo operations are expensive. Consider using bitwise AND for powers of 2.",
                0.6,
                Impact::Medium,
                1_200,
            );
        }

        if code.contains("string") && (code.contains("concat") || code.contains('+')) {
            out.push(
                "string.concat",
                SuggestionKind::String,
                "String concatenation is gas-expensive. Consider using bytes or assembly.",
                0.7,
                Impact::High,
                8_000,
            );
        }

        if code.contains(".push(") || code.contains(".pop()") {
            out.push(
                "array.dynamic",
                SuggestionKind::Array,
                "Dynamic array operations are expensive. Consider using fixed-size arrays when possible.",
                0.5,
                Impact::Medium,
                4_000,
            );
        }
    }

    fn variable_rules(&self, code: &str, out: &mut Findings) {
        if code.contains("uint256") && code.contains("< 256") {
            out.push(
                "types.small_uint",
                SuggestionKind::Types,
                "Consider using uint8 or uint16 for small values to save gas in structs.",
                0.4,
                Impact::Low,
                1_000,
            );
        }

        if has_reused_literal_assignment(code) && !code.contains("constant") {
            out.push(
                "constants.unchanging",
                SuggestionKind::Constants,
                "Consider marking unchanging values as \"constant\" or \"immutable\".",
                0.6,
                Impact::Medium,
                2_000,
            );
        }

        if code.contains("uint256 i = 0") {
            out.push(
                "variables.loop_counter_init",
                SuggestionKind::Variables,
                "Avoid explicit initialization of loop counters to 0 (default value).",
                0.8,
                Impact::Low,
                500,
            );
        }
    }

    fn control_flow_rules(&self, code: &str, out: &mut Findings) {
        let requires = REQUIRE_CALL.find_iter(code).count() as u64;
        if requires > 2 {
            out.push(
                "control_flow.require_count",
                SuggestionKind::ControlFlow,
                "Multiple require statements detected. Consider custom errors and early returns.",
                0.7,
                Impact::Medium,
                requires * 1_000,
            );
        }

        if code.contains("&&") || code.contains("||") {
            out.push(
                "control_flow.short_circuit",
                SuggestionKind::ControlFlow,
                "Optimize boolean operations by placing cheaper conditions first.",
                0.5,
                Impact::Low,
                500,
            );
        }

        if ELSE_IF.find_iter(code).count() > 3 {
            out.push(
                "control_flow.if_chain",
                SuggestionKind::ControlFlow,
                "Consider using mapping-based lookup instead of long if-else chains.",
                0.6,
                Impact::Medium,
                3_000,
            );
        }
    }

    fn advanced_rules(&self, function: &Function, code: &str, out: &mut Findings) {
        if (code.contains(".call(") || code.contains(".call{")) && !code.contains("nonReentrant") {
            out.push(
                "security.reentrancy",
                SuggestionKind::Security,
                "External call detected. Consider reentrancy protection and checks-effects-interactions pattern.",
                0.8,
                Impact::High,
                0,
            );
        }

        if code.contains("emit") && code.contains("string") {
            out.push(
                "events.string_payload",
                SuggestionKind::Events,
                "Avoid emitting strings in events. Use indexed parameters and bytes32 when possible.",
                0.7,
                Impact::Medium,
                5_000,
            );
        }

        if function.name.contains("get") && code.contains("return") {
            out.push(
                "patterns.getter",
                SuggestionKind::Patterns,
                "Getter functions should be marked as \"view\" and consider using public variables instead.",
                0.6,
                Impact::Low,
                1_000,
            );
        }

        if code.contains("keccak256") || code.contains("sha256") {
            out.push(
                "assembly.hashing",
                SuggestionKind::Assembly,
                "Consider using inline assembly for hash operations to save gas.",
                0.4,
                Impact::Medium,
                2_000,
            );
        }
    }
}

/// Assignment, event, transfer, external call, revert path or array
/// mutation anywhere in `code`.
pub fn has_state_changes(code: &str) -> bool {
    STATE_CHANGE.is_match(code)
}

/// `true` when `code` reads no environment, balance, mapping or hash input.
pub fn is_referentially_pure(code: &str) -> bool {
    !STATE_READ.is_match(code)
}

/// Same-name heuristic: the name followed by `(` more than once (the
/// declaration itself accounts for one).
pub fn is_called_internally(code: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    match Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))) {
        Ok(call) => call.find_iter(code).count() > 1,
        Err(_) => false,
    }
}

/// An identifier assigned a literal and mentioned again later on the same
/// line.
fn has_reused_literal_assignment(code: &str) -> bool {
    LITERAL_ASSIGNMENT.captures_iter(code).any(|caps| {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            return false;
        };
        let rest = &code[whole.end()..];
        let line = rest.split('\n').next().unwrap_or_default();
        contains_word(line, name.as_str())
    })
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(word).any(|(at, _)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}
