//! Accumulation domain errors

use thiserror::Error;

use core_kernel::{AmountError, PortError};
use crate::ports::TransferError;

/// Errors that can occur in the accumulation domain
#[derive(Debug, Error)]
pub enum AccumulationError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Mapping {mapping_id} is in terminal state {status} and cannot change")]
    TerminalMapping { mapping_id: String, status: String },

    #[error("Unknown payer: {0}")]
    UnknownPayer(String),

    #[error("Invalid payer code: {0}")]
    InvalidPayerCode(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Store error: {0}")]
    Store(#[from] PortError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl AccumulationError {
    /// Returns true for key-import and decryption failures
    pub fn is_security(&self) -> bool {
        matches!(self, AccumulationError::Transfer(e) if e.is_security())
    }
}
