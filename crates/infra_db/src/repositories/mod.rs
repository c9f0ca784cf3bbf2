//! Repository implementations
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! plain row structs; they know nothing about domain types.

pub mod accumulation;

pub use accumulation::AccumulationRepository;
