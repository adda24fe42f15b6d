//! Gas optimization advisor for Solidity contracts.
//!
//! Source text is parsed into functions, scanned for gas-relevant patterns,
//! run through a rule engine, optionally enriched by a generative provider,
//! ranked, and joined with gas measured by Foundry or Hardhat.

pub mod adapters;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod integrator;
pub mod llm;
pub mod parser;
pub mod patterns;
pub mod ranker;
pub mod reporter;
pub mod rules;
pub mod types;

pub use analyzer::Analyzer;
pub use config::GuardConfig;
pub use error::{GuardError, Result};
