//! Contract test harness for boundlibc.
//!
//! This crate provides:
//! - Contract cases: black-box checks of every guarded operation against
//!   null arguments, bound overflow, directive injection and the nominal path
//! - A built-in catalog covering each guarded function
//! - Structured JSONL logging with an artifact index for run evidence

#![forbid(unsafe_code)]

pub mod catalog;
pub mod contract;
pub mod error;
pub mod structured_log;

pub use catalog::builtin_suite;
pub use contract::{CaseResult, ContractCase, ContractClause, ContractSuite, ExpectedOutcome};
pub use error::HarnessError;
