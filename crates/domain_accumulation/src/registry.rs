//! Payer registry
//!
//! Maps payer codes onto configuration records and the builder/parser pair
//! each record selects. Adding a payer means adding a profile, not a type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::builder::{DelimitedFileBuilder, PayerFileBuilder, SegmentFileBuilder};
use crate::codec::{Delimiters, SegmentCodec};
use crate::error::AccumulationError;
use crate::payer::PayerCode;
use crate::response::{
    DelimitedResponseParser, ResponseCodeTable, ResponseOutcome, ResponseParser, SegmentResponseParser,
};

/// File layout family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayerFormat {
    /// HDR/DTL/TRL segments
    Segment,
    /// Header row plus one delimited row per record
    Delimited,
}

/// Configuration record describing one payer's file exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerProfile {
    pub code: PayerCode,
    pub name: String,
    /// Identifies us in file headers
    pub sender_id: String,
    pub format: PayerFormat,
    pub delimiters: Delimiters,
    /// Layout carries member name and date of birth
    #[serde(default)]
    pub require_member: bool,
    pub response_codes: ResponseCodeTable,
}

impl PayerProfile {
    pub fn anthem() -> Self {
        Self {
            code: PayerCode::builtin("ANTHEM"),
            name: "Anthem Blue Cross".to_string(),
            sender_id: "ACCUMSVC".to_string(),
            format: PayerFormat::Segment,
            delimiters: Delimiters::x12(),
            require_member: false,
            response_codes: ResponseCodeTable::from_pairs([
                ("PR", ResponseOutcome::Processed),
                ("AC", ResponseOutcome::Accepted),
                ("RJ", ResponseOutcome::Rejected),
                ("RV", ResponseOutcome::Refunded),
            ]),
        }
    }

    pub fn esi() -> Self {
        Self {
            code: PayerCode::builtin("ESI"),
            name: "Express Scripts".to_string(),
            sender_id: "ACCUMSVC".to_string(),
            format: PayerFormat::Segment,
            delimiters: Delimiters::pipe(),
            require_member: true,
            response_codes: ResponseCodeTable::from_pairs([
                ("A", ResponseOutcome::Processed),
                ("K", ResponseOutcome::Accepted),
                ("R", ResponseOutcome::Rejected),
                ("V", ResponseOutcome::Refunded),
            ]),
        }
    }

    pub fn cigna() -> Self {
        Self {
            code: PayerCode::builtin("CIGNA"),
            name: "Cigna".to_string(),
            sender_id: "ACCUMSVC".to_string(),
            format: PayerFormat::Delimited,
            delimiters: Delimiters::pipe(),
            require_member: true,
            response_codes: ResponseCodeTable::from_pairs([
                ("PROCESSED", ResponseOutcome::Processed),
                ("ACCEPTED", ResponseOutcome::Accepted),
                ("REJECTED", ResponseOutcome::Rejected),
                ("REVERSED", ResponseOutcome::Refunded),
            ]),
        }
    }
}

struct RegisteredPayer {
    profile: PayerProfile,
    builder: Arc<dyn PayerFileBuilder>,
    parser: Arc<dyn ResponseParser>,
}

/// Registry keyed on payer code
#[derive(Default)]
pub struct PayerRegistry {
    payers: HashMap<PayerCode, RegisteredPayer>,
}

impl PayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in profiles
    pub fn with_defaults() -> Result<Self, AccumulationError> {
        let mut registry = Self::new();
        for profile in [PayerProfile::anthem(), PayerProfile::esi(), PayerProfile::cigna()] {
            registry.register(profile)?;
        }
        Ok(registry)
    }

    /// Adds or replaces a profile
    pub fn register(&mut self, profile: PayerProfile) -> Result<(), AccumulationError> {
        let codec = SegmentCodec::new(profile.delimiters.clone())?;
        let (builder, parser): (Arc<dyn PayerFileBuilder>, Arc<dyn ResponseParser>) = match profile.format {
            PayerFormat::Segment => (
                Arc::new(SegmentFileBuilder::new(codec.clone(), profile.sender_id.clone(), profile.require_member)),
                Arc::new(SegmentResponseParser::new(codec)),
            ),
            PayerFormat::Delimited => (
                Arc::new(DelimitedFileBuilder::new(codec.clone(), profile.require_member)),
                Arc::new(DelimitedResponseParser::new(codec)),
            ),
        };
        self.payers.insert(
            profile.code.clone(),
            RegisteredPayer { profile, builder, parser },
        );
        Ok(())
    }

    /// Layers configured response codes over a registered profile
    pub fn override_response_codes(
        &mut self,
        code: &PayerCode,
        overrides: &ResponseCodeTable,
    ) -> Result<(), AccumulationError> {
        let entry = self
            .payers
            .get_mut(code)
            .ok_or_else(|| AccumulationError::UnknownPayer(code.to_string()))?;
        entry.profile.response_codes.merge(overrides);
        Ok(())
    }

    pub fn profile(&self, code: &PayerCode) -> Result<&PayerProfile, AccumulationError> {
        self.entry(code).map(|entry| &entry.profile)
    }

    pub fn builder(&self, code: &PayerCode) -> Result<Arc<dyn PayerFileBuilder>, AccumulationError> {
        self.entry(code).map(|entry| Arc::clone(&entry.builder))
    }

    pub fn parser(&self, code: &PayerCode) -> Result<Arc<dyn ResponseParser>, AccumulationError> {
        self.entry(code).map(|entry| Arc::clone(&entry.parser))
    }

    /// Registered codes in sorted order
    pub fn codes(&self) -> Vec<PayerCode> {
        let mut codes: Vec<PayerCode> = self.payers.keys().cloned().collect();
        codes.sort();
        codes
    }

    fn entry(&self, code: &PayerCode) -> Result<&RegisteredPayer, AccumulationError> {
        self.payers
            .get(code)
            .ok_or_else(|| AccumulationError::UnknownPayer(code.to_string()))
    }
}

impl std::fmt::Debug for PayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayerRegistry")
            .field("payers", &self.codes())
            .finish()
    }
}
