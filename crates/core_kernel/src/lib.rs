//! Core Kernel - Foundational types for the claims-accumulation pipeline
//!
//! This crate provides the building blocks shared by the domain and
//! infrastructure crates:
//! - Integer-cent amounts with exact decimal-dollar conversion
//! - Strongly-typed identifiers for mappings, reports, payers and claims
//! - Port error types and marker traits for the hexagonal architecture

pub mod amount;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use amount::{Cents, AmountError};
pub use identifiers::{
    MappingId, ReportId, PayerId, ReimbursementClaimId, ReimbursementRequestId,
    ClaimReference,
};
pub use error::CoreError;
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
