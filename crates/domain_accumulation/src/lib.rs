//! Payer Claims-Accumulation Domain
//!
//! This crate tracks members' deductible and out-of-pocket spend across
//! external payers. It renders outbound accumulation files, reconciles the
//! payers' response files, and owns the per-claim state machine.
//!
//! # Mapping Lifecycle
//!
//! ```text
//! WAITING -> SUBMITTED -> PROCESSED | ACCEPTED | REJECTED | ROW_ERROR | REFUNDED
//! WAITING | SUBMITTED -> SKIP | REJECTED   (explicit decisions)
//! ```

pub mod status;
pub mod mapping;
pub mod report;
pub mod payer;
pub mod record;
pub mod codec;
pub mod builder;
pub mod response;
pub mod registry;
pub mod ports;
pub mod memory;
pub mod sourcer;
pub mod processor;
pub mod error;

pub use status::{TreatmentAccumulationStatus, ReportStatus};
pub use mapping::AccumulationTreatmentMapping;
pub use report::{PayerAccumulationReport, report_filename};
pub use payer::{Payer, PayerCode};
pub use record::{AccumulationClaimRecord, MemberDemographics};
pub use codec::{Delimiters, Segment, SegmentCodec, CodecError};
pub use builder::{BatchHeader, BuildError, BuiltFile, OutboundLine, PayerFileBuilder};
pub use response::{ParsedResponse, ResponseCodeTable, ResponseLine, ResponseOutcome, ResponseParseError, ResponseParser};
pub use registry::{PayerFormat, PayerProfile, PayerRegistry};
pub use ports::{AccumulationStore, ClaimOutcome, ClaimSource, TransferError, TransferPort};
pub use sourcer::{DataSourcer, SourcingSummary};
pub use processor::{ResponseProcessor, ReconciliationSummary, LineAnomaly, AnomalyKind};
pub use error::AccumulationError;
