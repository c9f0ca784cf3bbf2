//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! accumulation pipeline test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for payers, dates and claims
//! - `builders`: Builders for claim records, mappings and response files
//! - `database`: PostgreSQL test container management
//! - `assertions`: Assertion helpers for mappings and reports
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
