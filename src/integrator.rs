// src/integrator.rs
//! Attaches measured gas to parsed functions and totals the results.

use tracing::debug;

use crate::types::*;

pub const LOW_GAS_CEILING: u64 = 30_000;
pub const MEDIUM_GAS_CEILING: u64 = 100_000;

/// Buckets a measured cost. Zero means "not measured".
pub fn gas_rank(gas: u64) -> GasRank {
    match gas {
        0 => GasRank::Unknown,
        g if g < LOW_GAS_CEILING => GasRank::Low,
        g if g < MEDIUM_GAS_CEILING => GasRank::Medium,
        _ => GasRank::High,
    }
}

/// Estimated gas saved by applying every suggestion.
///
/// With a measured cost each suggestion contributes a share of it
/// (15% / 8% / 3% by impact, floored per suggestion); without one, a flat
/// 15000 / 5000 / 1000. Sums saturate at `u64::MAX`.
pub fn potential_savings(suggestions: &[Suggestion], gas: u64) -> u64 {
    suggestions
        .iter()
        .map(|s| {
            if gas > 0 {
                let percent = match s.impact {
                    Impact::High => 15,
                    Impact::Medium => 8,
                    Impact::Low => 3,
                };
                (u128::from(gas) * percent / 100) as u64
            } else {
                match s.impact {
                    Impact::High => 15_000,
                    Impact::Medium => 5_000,
                    Impact::Low => 1_000,
                }
            }
        })
        .fold(0, u64::saturating_add)
}

/// Wraps `contract` with costs and ranked suggestions.
///
/// `ranked[i]` belongs to `contract.functions[i]`; missing entries mean no
/// suggestions. Costs are looked up by lowercase function name.
pub fn integrate(
    contract: Contract,
    file: &str,
    ranked: Vec<Vec<Suggestion>>,
    costs: &GasData,
) -> ContractAnalysis {
    let mut ranked = ranked.into_iter();

    let functions: Vec<AnalyzedFunction> = contract
        .functions
        .into_iter()
        .map(|function| {
            let suggestions = ranked.next().unwrap_or_default();
            let gas_usage = costs
                .get(&function.name.to_lowercase())
                .copied()
                .unwrap_or(0);
            debug!("{} -> {} gas", function.name, gas_usage);

            AnalyzedFunction {
                gas_rank: gas_rank(gas_usage),
                has_gas_data: gas_usage > 0,
                potential_savings: potential_savings(&suggestions, gas_usage),
                gas_usage,
                suggestions,
                function,
            }
        })
        .collect();

    let total_gas_usage = functions
        .iter()
        .map(|f| f.gas_usage)
        .fold(0, u64::saturating_add);
    let total_potential_savings = functions
        .iter()
        .map(|f| f.potential_savings)
        .fold(0, u64::saturating_add);

    ContractAnalysis {
        name: contract.name,
        file: file.to_string(),
        functions,
        state_variables: contract.state_variables,
        total_lines: contract.total_lines,
        total_gas_usage,
        total_potential_savings,
        gas_data_available: total_gas_usage > 0,
        framework: None,
        diagnostics: Vec::new(),
    }
}

/// Aggregate statistics; ratios are rounded to the nearest integer and are
/// zero when their denominator is zero.
pub fn summarize(contracts: &[ContractAnalysis]) -> AnalysisSummary {
    let total_contracts = contracts.len();
    let total_functions: usize = contracts.iter().map(|c| c.functions.len()).sum();
    let total_gas_usage = contracts
        .iter()
        .map(|c| c.total_gas_usage)
        .fold(0, u64::saturating_add);
    let total_potential_savings = contracts
        .iter()
        .map(|c| c.total_potential_savings)
        .fold(0, u64::saturating_add);
    let contracts_with_gas_data = contracts.iter().filter(|c| c.gas_data_available).count();

    let ratio = |num: f64, den: f64| {
        if den > 0.0 {
            (num / den).round() as u64
        } else {
            0
        }
    };

    AnalysisSummary {
        total_contracts,
        total_functions,
        total_gas_usage,
        total_potential_savings,
        contracts_with_gas_data,
        gas_data_coverage: ratio(contracts_with_gas_data as f64 * 100.0, total_contracts as f64),
        average_gas_per_function: ratio(total_gas_usage as f64, total_functions as f64),
        potential_savings_percentage: ratio(
            total_potential_savings as f64 * 100.0,
            total_gas_usage as f64,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ContractParser, TextParser};

    const TOKEN: &str = r#"contract Token {
    mapping(address => uint256) balances;
    function transfer(address to, uint256 amount) public {
        balances[msg.sender] -= amount;
        balances[to] = amount;
    }
    function approve(address spender) public {
        allowed[spender] = 1;
    }
}"#;

    fn suggestion(impact: Impact) -> Suggestion {
        Suggestion::from_rule("test", SuggestionKind::Storage, "msg", 0.5, impact, 0)
    }

    #[test]
    fn test_gas_rank_boundaries() {
        assert_eq!(gas_rank(0), GasRank::Unknown);
        assert_eq!(gas_rank(1), GasRank::Low);
        assert_eq!(gas_rank(29_999), GasRank::Low);
        assert_eq!(gas_rank(30_000), GasRank::Medium);
        assert_eq!(gas_rank(99_999), GasRank::Medium);
        assert_eq!(gas_rank(100_000), GasRank::High);
    }

    #[test]
    fn test_savings_with_measured_gas_floor_each_term() {
        let suggestions = vec![
            suggestion(Impact::High),
            suggestion(Impact::Medium),
            suggestion(Impact::Low),
        ];

        // floor(1010 * .15) + floor(1010 * .08) + floor(1010 * .03)
        assert_eq!(potential_savings(&suggestions, 1_010), 151 + 80 + 30);
    }

    #[test]
    fn test_savings_without_gas_are_flat() {
        let suggestions = vec![
            suggestion(Impact::High),
            suggestion(Impact::Medium),
            suggestion(Impact::Low),
            suggestion(Impact::Low),
        ];

        assert_eq!(potential_savings(&suggestions, 0), 15_000 + 5_000 + 2_000);
        assert_eq!(potential_savings(&[], 50_000), 0);
    }

    #[test]
    fn test_transfer_with_measured_gas_is_high() {
        let contract = TextParser.parse(TOKEN);
        let costs = GasData::from([("transfer".to_string(), 133_128)]);

        let analysis = integrate(contract, "Token.sol", vec![], &costs);

        let transfer = &analysis.functions[0];
        assert_eq!(transfer.gas_usage, 133_128);
        assert_eq!(transfer.gas_rank, GasRank::High);
        assert!(transfer.has_gas_data);

        let approve = &analysis.functions[1];
        assert_eq!(approve.gas_rank, GasRank::Unknown);
        assert!(!approve.has_gas_data);

        assert_eq!(analysis.total_gas_usage, 133_128);
        assert!(analysis.gas_data_available);
        assert_eq!(analysis.functions_with_gas_data(), 1);
    }

    #[test]
    fn test_lookup_is_case_insensitive_on_function_name() {
        let contract = TextParser.parse(
            "contract C { function batchTransfer() public { x = 1; } }",
        );
        let costs = GasData::from([("batchtransfer".to_string(), 45_000)]);

        let analysis = integrate(contract, "C.sol", vec![], &costs);

        assert_eq!(analysis.functions[0].gas_rank, GasRank::Medium);
    }

    #[test]
    fn test_suggestions_are_zipped_by_index_and_totalled() {
        let contract = TextParser.parse(TOKEN);
        let ranked = vec![
            vec![suggestion(Impact::High)],
            vec![suggestion(Impact::Low), suggestion(Impact::Medium)],
        ];

        let analysis = integrate(contract, "Token.sol", ranked, &GasData::new());

        assert_eq!(analysis.functions[0].suggestions.len(), 1);
        assert_eq!(analysis.functions[0].potential_savings, 15_000);
        assert_eq!(analysis.functions[1].potential_savings, 6_000);
        assert_eq!(analysis.total_potential_savings, 21_000);
        assert!(!analysis.gas_data_available);
        assert_eq!(analysis.state_variables, vec!["balances".to_string()]);
    }

    #[test]
    fn test_summary_rounds_ratios() {
        let contract = TextParser.parse(TOKEN);
        let with_gas = integrate(
            contract.clone(),
            "a.sol",
            vec![vec![suggestion(Impact::Medium)]],
            &GasData::from([("transfer".to_string(), 100_001)]),
        );
        let without_gas = integrate(contract, "b.sol", vec![], &GasData::new());

        let invalid = integrate(TextParser.parse("x"), "c.sol", vec![], &GasData::new());

        let summary = summarize(&[with_gas, without_gas, invalid]);

        assert_eq!(summary.total_contracts, 3);
        assert_eq!(summary.total_functions, 4);
        assert_eq!(summary.total_gas_usage, 100_001);
        assert_eq!(summary.contracts_with_gas_data, 1);
        assert_eq!(summary.gas_data_coverage, 33);
        assert_eq!(summary.average_gas_per_function, 25_000);
        assert_eq!(summary.total_potential_savings, 8_000);
        assert_eq!(summary.potential_savings_percentage, 8);
    }

    #[test]
    fn test_summary_of_nothing_is_zero() {
        assert_eq!(summarize(&[]), AnalysisSummary::default());
    }

    #[test]
    fn test_huge_costs_saturate_instead_of_overflowing() {
        let share = potential_savings(&[suggestion(Impact::High)], u64::MAX / 10);
        assert_eq!(share, (u128::from(u64::MAX / 10) * 15 / 100) as u64);

        let many = vec![suggestion(Impact::High); 10];
        assert_eq!(potential_savings(&many, u64::MAX), u64::MAX);

        let contract = TextParser.parse(TOKEN);
        let costs = GasData::from([
            ("transfer".to_string(), u64::MAX / 2 + 1),
            ("approve".to_string(), u64::MAX / 2 + 1),
        ]);
        let ranked = vec![vec![suggestion(Impact::High)], vec![suggestion(Impact::Medium)]];

        let analysis = integrate(contract, "Token.sol", ranked, &costs);

        assert_eq!(analysis.total_gas_usage, u64::MAX);
        assert_eq!(analysis.functions[0].gas_rank, GasRank::High);

        let summary = summarize(&[analysis.clone(), analysis]);
        assert_eq!(summary.total_gas_usage, u64::MAX);
        assert!(summary.total_potential_savings > 0);
    }
}
