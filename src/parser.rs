// src/parser.rs
//! Structural Solidity parser.
//!
//! Recovers a function-level model from raw text without a grammar. Function
//! headers are found with a regex; bodies are delimited by walking forward
//! from the opening brace and counting depth, so nested blocks never cut a
//! body short.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::patterns::detect_patterns;
use crate::types::*;

static DECLARING_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:contract|interface|library)\b").unwrap());

static CONTRACT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:contract|interface|library)\s+(\w+)").unwrap());

static FUNCTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"function\s+(\w+)\s*\(([^)]*)\)((?:\s*\w+\s*(?:\([^)]*\))?)*)\s*\{",
    )
    .unwrap()
});

// One qualifier word, with its argument list for modifier invocations and
// `returns (...)`.
static QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*(?:\(([^)]*)\))?").unwrap());

static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\w+(?:\[\d*\])*)\s+(?:(?:memory|storage|calldata|payable|indexed)\s+)*(\w+)\s*$",
    )
    .unwrap()
});

static STATE_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:u?int\d*|address|bool|string|bytes\d*|mapping\s*\([^;{}]*\))\s+(?:(?:public|private|internal|constant|immutable|payable|override)\s+)*(\w+)",
    )
    .unwrap()
});

/// Words that can follow a type without being a variable name.
const RESERVED: &[&str] = &[
    "memory", "storage", "calldata", "indexed", "returns", "public", "private", "internal",
    "external", "constant", "immutable", "payable", "override", "virtual", "pure", "view",
    "function", "return", "is",
];

/// One `parse` capability with interchangeable implementations.
pub trait ContractParser: Send + Sync {
    /// Parses source text into a [`Contract`]. Never fails: malformed input
    /// yields fewer (or zero) functions.
    fn parse(&self, source: &str) -> Contract;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Which parser implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    #[default]
    Text,
    Masking,
}

impl ParserKind {
    pub fn build(&self) -> Box<dyn ContractParser> {
        match self {
            Self::Text => Box::new(TextParser),
            Self::Masking => Box::new(MaskingParser),
        }
    }
}

/// Scans the raw text directly.
///
/// Braces inside comments or string literals are counted like any other
/// brace; that is a known limitation of this implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl ContractParser for TextParser {
    fn parse(&self, source: &str) -> Contract {
        parse_structure(source, source)
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

/// Blanks comments and string literals before scanning.
///
/// Offsets are preserved, so `source_code` is still sliced from the
/// original text, comments included.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskingParser;

impl ContractParser for MaskingParser {
    fn parse(&self, source: &str) -> Contract {
        let masked = mask_comments_and_strings(source);
        parse_structure(source, &masked)
    }

    fn name(&self) -> &'static str {
        "masking"
    }
}

/// Number of `\n`-separated segments in `source`.
pub fn count_lines(source: &str) -> usize {
    source.split('\n').count()
}

/// `scan` must be byte-for-byte aligned with `source`; all matching happens
/// on `scan`, all extracted text comes from `source`.
fn parse_structure(source: &str, scan: &str) -> Contract {
    let total_lines = count_lines(source);
    // Declarations and parenthesised lists never live in comments or strings.
    let code = mask_comments_and_strings(scan);

    if !DECLARING_KEYWORD.is_match(&code) {
        warn!("Source has no contract, interface or library declaration");
        return Contract::invalid(total_lines);
    }

    let name = CONTRACT_NAME
        .captures(&code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_CONTRACT.to_string());

    let mut functions = Vec::new();
    let mut spans = Vec::new();
    let mut line = 1;
    let mut line_cursor = 0;

    for caps in FUNCTION_HEADER.captures_iter(scan) {
        let Some(header) = caps.get(0) else {
            continue;
        };
        let start = header.start();
        let open_brace = header.end() - 1;

        let Some(close_brace) = find_matching_brace(scan, open_brace) else {
            debug!("Unterminated body for function `{}`, skipping", &caps[1]);
            continue;
        };
        let end = close_brace + 1;

        line += scan[line_cursor..start].matches('\n').count();
        line_cursor = start;

        let qualifiers = parse_qualifiers(caps.get(3).map_or(0..0, |m| m.range()), source, scan);

        let patterns = detect_patterns(&scan[start..end]);
        let complexity_score = Function::complexity_for(&patterns);

        debug!(
            "Parsed function `{}` at line {} ({} patterns)",
            &caps[1],
            line,
            patterns.len()
        );

        functions.push(Function {
            name: caps[1].to_string(),
            visibility: qualifiers.visibility,
            state_mutability: qualifiers.state_mutability,
            parameters: parse_parameters(&source[caps.get(2).map_or(0..0, |m| m.range())]),
            returns: qualifiers.returns,
            modifiers: qualifiers.modifiers,
            patterns,
            source_code: source[start..end].to_string(),
            start_line: line,
            complexity_score,
        });
        spans.push(start..end);
    }

    Contract {
        name,
        functions,
        state_variables: extract_state_variables(scan, &code, &spans),
        total_lines,
    }
}

/// Index of the brace closing the one at `open`, or `None` if the text ends
/// first.
pub fn find_matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    for (offset, byte) in bytes[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Debug, Default)]
struct Qualifiers {
    visibility: Visibility,
    state_mutability: StateMutability,
    returns: Option<String>,
    modifiers: Vec<String>,
}

/// Sorts the words between the parameter list and the body into
/// visibility, mutability, the `returns` clause and everything else.
/// The first visibility or mutability keyword wins.
fn parse_qualifiers(range: std::ops::Range<usize>, source: &str, scan: &str) -> Qualifiers {
    let mut visibility = None;
    let mut mutability = None;
    let mut qualifiers = Qualifiers::default();
    let offset = range.start;

    for caps in QUALIFIER.captures_iter(&scan[range]) {
        let word = &caps[1];
        if word == "returns" {
            if let Some(args) = caps.get(2) {
                let start = offset + args.start();
                qualifiers.returns = Some(source[start..offset + args.end()].trim().to_string());
            }
        } else if let Some(v) = Visibility::from_keyword(word) {
            visibility.get_or_insert(v);
        } else if let Some(m) = StateMutability::from_keyword(word) {
            mutability.get_or_insert(m);
        } else if let Some(whole) = caps.get(0) {
            let text = &source[offset + whole.start()..offset + whole.end()];
            qualifiers.modifiers.push(text.trim().to_string());
        }
    }

    qualifiers.visibility = visibility.unwrap_or_default();
    qualifiers.state_mutability = mutability.unwrap_or_default();
    qualifiers
}

/// Splits a parameter list on commas; entries without a `type name` shape
/// are dropped.
pub fn parse_parameters(list: &str) -> Vec<Parameter> {
    list.split(',')
        .filter_map(|entry| {
            let caps = PARAMETER.captures(entry)?;
            let name = &caps[2];
            if RESERVED.contains(&name) {
                return None;
            }
            Some(Parameter {
                ty: caps[1].to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// State variable names outside function bodies and parenthesised lists
/// (events, errors, constructor parameters), unique and in first-seen order.
///
/// Parenthesis depth is tracked on `code`, the masked copy of `scan`, and
/// drops back to zero at every statement or block boundary.
fn extract_state_variables(
    scan: &str,
    code: &str,
    function_spans: &[std::ops::Range<usize>],
) -> Vec<String> {
    let bytes = code.as_bytes();
    let mut names: Vec<String> = Vec::new();
    let mut paren_depth = 0i32;
    let mut cursor = 0;

    for caps in STATE_VARIABLE.captures_iter(scan) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        for byte in &bytes[cursor..whole.start()] {
            match byte {
                b'(' => paren_depth += 1,
                b')' => paren_depth = (paren_depth - 1).max(0),
                b';' | b'{' | b'}' => paren_depth = 0,
                _ => {}
            }
        }
        cursor = whole.start();

        if paren_depth > 0 || function_spans.iter().any(|span| span.contains(&whole.start())) {
            continue;
        }

        let name = &caps[1];
        if RESERVED.contains(&name) || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
    }

    names
}

/// Replaces comment and string-literal contents with spaces, keeping
/// newlines and byte offsets intact.
pub fn mask_comments_and_strings(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(u8),
    }

    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        let next = bytes.get(i + 1).copied();

        match state {
            State::Code => match (byte, next) {
                (b'/', Some(b'/')) => {
                    state = State::LineComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                (b'"' | b'\'', _) => {
                    state = State::Str(byte);
                    out.push(byte);
                }
                _ => out.push(byte),
            },
            State::LineComment => {
                if byte == b'\n' {
                    state = State::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
            }
            State::BlockComment => {
                if byte == b'*' && next == Some(b'/') {
                    state = State::Code;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                out.push(if byte == b'\n' { b'\n' } else { b' ' });
            }
            State::Str(quote) => {
                if byte == b'\\' && next.is_some() {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                if byte == quote {
                    state = State::Code;
                    out.push(byte);
                } else {
                    out.push(if byte == b'\n' { b'\n' } else { b' ' });
                }
            }
        }
        i += 1;
    }

    // Only whole characters are blanked (every boundary is ASCII), so the
    // result is valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}
