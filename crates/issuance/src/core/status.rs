//! Credential lifecycle state machine
//!
//! The transition table below is the single authority on status changes.
//! Every component that writes a status goes through
//! [`CredentialStatus::transition_to`] (via [`crate::lifecycle::Lifecycle`]),
//! never through its own checks.
//!
//! # State Transitions
//!
//! ```text
//! DRAFT ──► PEND_SIGNATURE ──► ISSUED ──► PEND_DOWNLOAD ──► VALID ──► EXPIRED
//!   │                            ▲  │                         ▲
//!   └────────────────────────────┘  └─────────────────────────┘
//!
//! ISSUED | PEND_DOWNLOAD | VALID ──► REVOKED
//! WITHDRAWN: legacy, no inbound or outbound transitions
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::IssuanceError;

/// Status of a credential procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    /// Created, signing not yet requested
    Draft,
    /// Queued for the external signer
    PendSignature,
    /// Signed, waiting for the holder to download it
    PendDownload,
    /// Signed artifact recorded
    Issued,
    /// Delivered and in force
    Valid,
    /// Revoked by an explicit operation
    Revoked,
    /// Validity window elapsed
    Expired,
    /// Legacy terminal status, unreachable from new transitions
    Withdrawn,
}

impl CredentialStatus {
    /// Every status, in lifecycle order
    pub const ALL: [CredentialStatus; 8] = [
        Self::Draft,
        Self::PendSignature,
        Self::PendDownload,
        Self::Issued,
        Self::Valid,
        Self::Revoked,
        Self::Expired,
        Self::Withdrawn,
    ];

    /// Check if transition to the target status is legal
    #[must_use]
    pub fn can_transition_to(&self, target: CredentialStatus) -> bool {
        use CredentialStatus::*;

        matches!(
            (self, target),
            (Draft, PendSignature)
                | (Draft, Issued)
                | (PendSignature, Issued)
                | (Issued, PendDownload)
                | (Issued, Valid)
                | (PendDownload, Valid)
                | (Valid, Expired)
                | (Valid, Revoked)
                | (Issued, Revoked)
                | (PendDownload, Revoked)
        )
    }

    /// Validate a transition, returning the target status
    pub fn transition_to(&self, target: CredentialStatus) -> Result<CredentialStatus, IssuanceError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(IssuanceError::IllegalStatusTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// No outbound transitions exist
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked | Self::Expired | Self::Withdrawn)
    }

    /// Holds a signed artifact that a holder may retrieve
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Issued | Self::PendDownload | Self::Valid)
    }

    /// Wire name, e.g. `PEND_SIGNATURE`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendSignature => "PEND_SIGNATURE",
            Self::PendDownload => "PEND_DOWNLOAD",
            Self::Issued => "ISSUED",
            Self::Valid => "VALID",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
