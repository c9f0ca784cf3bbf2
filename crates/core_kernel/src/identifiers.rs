//! Strongly-typed identifiers for pipeline entities
//!
//! Newtype wrappers around UUIDs keep mapping, report, payer and claim
//! identifiers from being mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Accumulation pipeline identifiers
define_id!(MappingId, "ATM");
define_id!(ReportId, "PAR");
define_id!(PayerId, "PYR");

// Upstream claim identifiers
define_id!(ReimbursementClaimId, "RCL");
define_id!(ReimbursementRequestId, "RRQ");

/// Reference to the upstream claim a mapping accumulates
///
/// Exactly one of the two claim kinds is referenced; the enum makes the
/// "both set" and "neither set" states unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ClaimReference {
    /// A reimbursement claim
    Claim(ReimbursementClaimId),
    /// A reimbursement request
    Request(ReimbursementRequestId),
}

impl ClaimReference {
    /// Returns the underlying UUID of whichever claim is referenced
    pub fn as_uuid(&self) -> &Uuid {
        match self {
            ClaimReference::Claim(id) => id.as_uuid(),
            ClaimReference::Request(id) => id.as_uuid(),
        }
    }

    /// Short discriminator used in storage and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimReference::Claim(_) => "claim",
            ClaimReference::Request(_) => "request",
        }
    }

    /// Rebuilds a reference from the two nullable columns a row stores
    ///
    /// # Errors
    ///
    /// `CoreError::Validation` unless exactly one side is present.
    pub fn from_parts(claim: Option<Uuid>, request: Option<Uuid>) -> Result<Self, CoreError> {
        match (claim, request) {
            (Some(c), None) => Ok(ClaimReference::Claim(ReimbursementClaimId::from_uuid(c))),
            (None, Some(r)) => Ok(ClaimReference::Request(ReimbursementRequestId::from_uuid(r))),
            (Some(_), Some(_)) => Err(CoreError::validation("both claim and request ids are set")),
            (None, None) => Err(CoreError::validation("neither claim nor request id is set")),
        }
    }

    /// Splits into the (claim, request) column pair
    pub fn into_parts(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            ClaimReference::Claim(id) => (Some(id.into()), None),
            ClaimReference::Request(id) => (None, Some(id.into())),
        }
    }
}

impl fmt::Display for ClaimReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimReference::Claim(id) => id.fmt(f),
            ClaimReference::Request(id) => id.fmt(f),
        }
    }
}

impl FromStr for ClaimReference {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(concat!("RRQ", "-")) {
            Ok(ClaimReference::Request(s.parse()?))
        } else {
            Ok(ClaimReference::Claim(s.parse()?))
        }
    }
}

impl From<ReimbursementClaimId> for ClaimReference {
    fn from(id: ReimbursementClaimId) -> Self {
        ClaimReference::Claim(id)
    }
}

impl From<ReimbursementRequestId> for ClaimReference {
    fn from(id: ReimbursementRequestId) -> Self {
        ClaimReference::Request(id)
    }
}
