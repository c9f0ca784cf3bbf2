//! Payer reference data

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::PayerId;
use crate::error::AccumulationError;

/// Upper-case payer code used to select builders, parsers and filenames
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayerCode(String);

impl PayerCode {
    /// Normalises to upper case; letters, digits and underscores only
    pub fn new(code: impl AsRef<str>) -> Result<Self, AccumulationError> {
        let code = code.as_ref().trim().to_ascii_uppercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AccumulationError::InvalidPayerCode(code));
        }
        Ok(Self(code))
    }

    /// Codes of the built-in profiles, already normalised
    pub(crate) fn builtin(code: &'static str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PayerCode {
    type Err = AccumulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PayerCode {
    type Error = AccumulationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PayerCode> for String {
    fn from(code: PayerCode) -> String {
        code.0
    }
}

/// An external insurance payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub id: PayerId,
    pub name: String,
    pub code: PayerCode,
}

impl Payer {
    pub fn new(name: impl Into<String>, code: PayerCode) -> Self {
        Self {
            id: PayerId::new_v7(),
            name: name.into(),
            code,
        }
    }
}
