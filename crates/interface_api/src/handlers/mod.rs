//! Request handlers

pub mod accumulation;
pub mod health;
