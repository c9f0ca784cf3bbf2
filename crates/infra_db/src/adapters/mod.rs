//! Domain Adapters
//!
//! Implementations of the accumulation domain ports backed by PostgreSQL.
//! Each adapter translates domain values to repository rows and database
//! errors to `PortError`.

pub mod accumulation;

pub use accumulation::{PostgresAccumulationStore, PostgresClaimSource};
