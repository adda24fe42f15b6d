//! Textual pattern detection over a single function's source.
//!
//! Every detector is a pure function of the text. Detection is heuristic:
//! no tokenizer, no scoping, just small regexes that are cheap to tune one
//! at a time.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Pattern, PatternKind};

pub const LOOP_GAS: u64 = 5_000;
pub const STORAGE_WRITE_GAS: u64 = 20_000;
pub const EXTERNAL_CALL_GAS: u64 = 2_300;
pub const VALIDATION_GAS: u64 = 500;

static LOOP_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:for|while)\s*\(").unwrap());

// Indexed assignment anywhere (one level of nested brackets), or a bare
// `name =` at the start of a statement.
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)\w+(?:\[(?:[^\[\]\n]|\[[^\[\]\n]*\])*\])+\s*=|(?:^|[;{}])\s*\w+\s*=",
    )
    .unwrap()
});

static EXTERNAL_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(?:call|delegatecall|staticcall)\s*[({]").unwrap());

static VALIDATION_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:require|assert)\s*\(").unwrap());

/// Runs every detector over `text`, in a fixed order.
pub fn detect_patterns(text: &str) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    if has_loop(text) {
        patterns.push(Pattern {
            kind: PatternKind::Loop,
            description: "Loop detected - gas scales with iterations".to_string(),
            estimated_gas: LOOP_GAS,
            suggestion: "Consider using fixed iterations or breaking into smaller chunks"
                .to_string(),
            occurrences: 1,
        });
    }

    let writes = count_storage_writes(text);
    if writes > 0 {
        patterns.push(Pattern {
            kind: PatternKind::StorageWrite,
            description: "Storage write operations detected".to_string(),
            estimated_gas: writes as u64 * STORAGE_WRITE_GAS,
            suggestion: "Consider batching storage operations".to_string(),
            occurrences: writes,
        });
    }

    if has_external_call(text) {
        patterns.push(Pattern {
            kind: PatternKind::ExternalCall,
            description: "External call detected".to_string(),
            estimated_gas: EXTERNAL_CALL_GAS,
            suggestion: "Ensure proper gas estimation and consider reentrancy protection"
                .to_string(),
            occurrences: 1,
        });
    }

    let validations = count_validations(text);
    if validations > 0 {
        patterns.push(Pattern {
            kind: PatternKind::Validation,
            description: "Input validation detected".to_string(),
            estimated_gas: validations as u64 * VALIDATION_GAS,
            suggestion: "Consider custom errors instead of require with strings".to_string(),
            occurrences: validations,
        });
    }

    patterns
}

pub fn has_loop(text: &str) -> bool {
    LOOP_HEAD.is_match(text)
}

/// Counts assignments, skipping `==` comparisons.
pub fn count_storage_writes(text: &str) -> usize {
    ASSIGNMENT
        .find_iter(text)
        .filter(|m| !text[m.end()..].starts_with('='))
        .count()
}

pub fn has_external_call(text: &str) -> bool {
    EXTERNAL_CALL.is_match(text)
}

pub fn count_validations(text: &str) -> usize {
    VALIDATION_CALL.find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<PatternKind> {
        detect_patterns(text).into_iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_bare_assignment_is_a_storage_write() {
        let text = "function setValue(uint256 _value) public { value = _value; }";

        assert_eq!(count_storage_writes(text), 1);
        assert_eq!(kinds(text), vec![PatternKind::StorageWrite]);
    }

    #[test]
    fn test_comparison_is_not_a_write() {
        let text = "function eq(uint256 a) public view returns (bool) {\n    return a == value;\n}";
        assert_eq!(count_storage_writes(text), 0);

        let indexed = "function f() public { if (balances[a] == 0) { return; } }";
        assert_eq!(count_storage_writes(indexed), 0);
    }

    #[test]
    fn test_local_declaration_is_not_a_write() {
        let text = "function f() public pure returns (uint256) {\n    uint256 total = 5;\n    return total;\n}";
        assert_eq!(count_storage_writes(text), 0);
    }

    #[test]
    fn test_nested_index_assignment_counts() {
        let text = "function f() public {\n    balances[recipients[i]] = amount;\n    allowance[a][b] = 1;\n}";
        assert_eq!(count_storage_writes(text), 2);
    }

    #[test]
    fn test_loop_and_indexed_write_detected_together() {
        let text = r#"function batchTransfer(address[] memory recipients, uint256 amount) public {
    for (uint256 i = 0; i < recipients.length; i++) {
        balances[recipients[i]] += 0;
        balances[recipients[i]] = amount;
    }
}"#;
        let detected = kinds(text);

        assert!(detected.contains(&PatternKind::Loop));
        assert!(detected.contains(&PatternKind::StorageWrite));
    }

    #[test]
    fn test_storage_estimate_scales_with_count() {
        let text = "function f() public {\n    a = 1;\n    b = 2;\n    c[0] = 3;\n}";
        let patterns = detect_patterns(text);
        let writes = patterns
            .iter()
            .find(|p| p.kind == PatternKind::StorageWrite)
            .unwrap();

        assert_eq!(writes.occurrences, 3);
        assert_eq!(writes.estimated_gas, 60_000);
    }

    #[test]
    fn test_external_call_shapes() {
        assert!(has_external_call("(bool ok, ) = to.call{value: amount}(\"\");"));
        assert!(has_external_call("target.delegatecall(data);"));
        assert!(has_external_call("target.staticcall (data);"));
        assert!(!has_external_call("recall(data);"));
    }

    #[test]
    fn test_validation_estimate_scales_with_count() {
        let text = "function f(uint256 a) public {\n    require(a > 0);\n    require(a < 10, \"big\");\n    assert(a != 5);\n}";
        let patterns = detect_patterns(text);
        let validation = patterns
            .iter()
            .find(|p| p.kind == PatternKind::Validation)
            .unwrap();

        assert_eq!(validation.occurrences, 3);
        assert_eq!(validation.estimated_gas, 1_500);
    }

    #[test]
    fn test_while_loop_detected() {
        assert!(has_loop("while (n > 0) { n--; }"));
        assert!(!has_loop("uint256 format = 1;"));
    }

    #[test]
    fn test_empty_text_has_no_patterns() {
        assert!(detect_patterns("").is_empty());
    }
}
