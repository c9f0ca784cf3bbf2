use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::status::TreatmentAccumulationStatus;

/// What a payer response code means for the mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOutcome {
    /// Amounts were applied
    Processed,
    /// Acknowledged without applying amounts
    Accepted,
    Rejected,
    /// A prior acceptance was reversed
    Refunded,
}

impl ResponseOutcome {
    pub fn status(&self) -> TreatmentAccumulationStatus {
        match self {
            Self::Processed => TreatmentAccumulationStatus::Processed,
            Self::Accepted => TreatmentAccumulationStatus::Accepted,
            Self::Rejected => TreatmentAccumulationStatus::Rejected,
            Self::Refunded => TreatmentAccumulationStatus::Refunded,
        }
    }
}

/// Payer response code -> outcome, treated as configuration data
///
/// Lookups are case-insensitive. Codes absent from the table are row errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, ResponseOutcome>", into = "HashMap<String, ResponseOutcome>")]
pub struct ResponseCodeTable {
    codes: HashMap<String, ResponseOutcome>,
}

impl ResponseCodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, ResponseOutcome)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (code, outcome) in pairs {
            table.insert(code, outcome);
        }
        table
    }

    pub fn insert(&mut self, code: impl AsRef<str>, outcome: ResponseOutcome) {
        self.codes.insert(code.as_ref().trim().to_ascii_uppercase(), outcome);
    }

    /// Layers `overrides` on top of this table
    pub fn merge(&mut self, overrides: &ResponseCodeTable) {
        for (code, outcome) in &overrides.codes {
            self.codes.insert(code.clone(), *outcome);
        }
    }

    pub fn resolve(&self, code: &str) -> Option<ResponseOutcome> {
        self.codes.get(&code.trim().to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl From<HashMap<String, ResponseOutcome>> for ResponseCodeTable {
    fn from(codes: HashMap<String, ResponseOutcome>) -> Self {
        Self::from_pairs(codes)
    }
}

impl From<ResponseCodeTable> for HashMap<String, ResponseOutcome> {
    fn from(table: ResponseCodeTable) -> Self {
        table.codes
    }
}
