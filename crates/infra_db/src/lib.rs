//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the accumulation pipeline using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: [`repositories`] holds the SQL
//! and row types, [`adapters`] implements the domain ports on top of them
//! and translates between rows and domain models.
//!
//! # Concurrency
//!
//! Claiming a record, attaching mappings to a report and completing a
//! report each run in a single transaction. A partial unique index allows
//! at most one WAITING or SUBMITTED mapping per (claim, payer), and mapping
//! updates are conditional on the previously read status.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig};
//! use infra_db::adapters::PostgresAccumulationStore;
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/accumulation")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresAccumulationStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PostgresAccumulationStore, PostgresClaimSource};
