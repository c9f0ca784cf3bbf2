//! Request and response bodies

pub mod accumulation;
