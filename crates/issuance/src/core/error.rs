//! Error types for issuance operations
//!
//! This module defines a two-tier error hierarchy:
//! - [`IssuanceError`]: engine-level taxonomy surfaced to callers
//! - [`StoreError`]: failures reported by a backing store
//!
//! Store errors convert into [`IssuanceError`] via `From`, so backends can be
//! called with `?` from every component.
//!
//! # Retry policy
//!
//! Only [`IssuanceError::StoreUnavailable`] is transient. The engine never
//! retries internally: single-use operations (offer and grant redemption)
//! cannot tell "my write landed but the response was lost" from "my write
//! failed", so a retry could duplicate a side effect.

use thiserror::Error;

use crate::core::{CredentialStatus, ProcedureId, SignatureFormat};

/// Top-level issuance error
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// Offer nonce unknown, already redeemed, or expired
    #[error("Credential offer not found")]
    OfferNotFound,

    /// Procedure does not exist
    #[error("Credential procedure '{id}' not found")]
    ProcedureNotFound {
        /// Procedure ID
        id: ProcedureId,
    },

    /// No issued credential carries the requested credential ID
    #[error("Credential '{id}' not found")]
    CredentialNotFound {
        /// Credential ID as supplied by the caller
        id: String,
    },

    /// Pre-authorized code or PIN rejected.
    ///
    /// Deliberately carries no detail: wrong code, wrong PIN, expiry and
    /// reuse are indistinguishable to the caller.
    #[error("Invalid pre-authorized grant")]
    InvalidGrant,

    /// Grant could not be persisted
    #[error("Failed to create pre-authorized grant: {source}")]
    GrantCreation {
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Transition not present in the lifecycle table
    #[error("Illegal status transition from {from} to {to}")]
    IllegalStatusTransition {
        /// Current status
        from: CredentialStatus,
        /// Requested status
        to: CredentialStatus,
    },

    /// Optimistic status guard failed: the row moved on between read and write
    #[error("Procedure '{id}' status changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        /// Procedure ID
        id: ProcedureId,
        /// Status the write was conditioned on
        expected: CredentialStatus,
        /// Status found in the store
        actual: CredentialStatus,
    },

    /// Signed artifact does not belong to a procedure awaiting a signature
    #[error("Signature mismatch for procedure '{id}': {reason}")]
    SignatureMismatch {
        /// Procedure ID named by the signer
        id: ProcedureId,
        /// Why the artifact was rejected
        reason: String,
    },

    /// No mapper or binder registered for the declared type
    #[error("Unsupported credential type '{credential_type}'")]
    UnsupportedCredentialType {
        /// Type tag as supplied by the caller
        credential_type: String,
    },

    /// A type-specific mapper rejected the raw payload
    #[error("Failed to map '{credential_type}' payload: {reason}")]
    Mapping {
        /// Type tag
        credential_type: String,
        /// Mapper-supplied reason
        reason: String,
    },

    /// Malformed identifier, request, or configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backing store failed (transient, safe for the caller to retry)
    #[error("Store unavailable: {source}")]
    StoreUnavailable {
        /// Underlying store error
        #[source]
        source: StoreError,
    },
}

/// Coarse classification of [`IssuanceError`] for transport mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Offer, grant, procedure or credential absent
    NotFound,
    /// Grant rejected
    InvalidGrant,
    /// Programming or protocol error
    IllegalStatusTransition,
    /// Signer submitted an artifact for a procedure not awaiting it
    SignatureMismatch,
    /// Unknown credential type
    UnsupportedCredentialType,
    /// Request or configuration rejected
    InvalidRequest,
    /// Transient infrastructure fault
    StoreUnavailable,
}

impl IssuanceError {
    /// Stable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OfferNotFound | Self::ProcedureNotFound { .. } | Self::CredentialNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::InvalidGrant => ErrorKind::InvalidGrant,
            Self::IllegalStatusTransition { .. } | Self::StatusConflict { .. } => {
                ErrorKind::IllegalStatusTransition
            }
            Self::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            Self::UnsupportedCredentialType { .. } => ErrorKind::UnsupportedCredentialType,
            Self::Mapping { .. } | Self::Validation(_) => ErrorKind::InvalidRequest,
            Self::GrantCreation { .. } | Self::StoreUnavailable { .. } => {
                ErrorKind::StoreUnavailable
            }
        }
    }

    /// Whether the caller may retry with backoff
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StoreUnavailable
    }

    pub(crate) fn signature_mismatch(id: &ProcedureId, reason: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            id: id.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn format_mismatch(
        id: &ProcedureId,
        expected: SignatureFormat,
        supplied: SignatureFormat,
    ) -> Self {
        Self::signature_mismatch(
            id,
            format!("procedure expects {expected} signature, got {supplied}"),
        )
    }
}

/// Backing store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable, timed out, or refused the operation
    #[error("Backend unavailable: {reason}")]
    Unavailable {
        /// Backend-supplied reason
        reason: String,
    },

    /// Key already present on insert
    #[error("Key '{key}' already exists")]
    Duplicate {
        /// Conflicting key
        key: String,
    },

    /// Conditional write rejected because the stored status differs
    #[error("Conditional write on '{id}' rejected: expected {expected}, found {actual}")]
    Conflict {
        /// Procedure ID
        id: ProcedureId,
        /// Status the write was conditioned on
        expected: CredentialStatus,
        /// Status found in the store
        actual: CredentialStatus,
    },

    /// Conditional write targeted a missing row
    #[error("Procedure '{id}' not found")]
    Missing {
        /// Procedure ID the write targeted
        id: ProcedureId,
    },

    /// Stored value could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for issuance operations
pub type Result<T> = std::result::Result<T, IssuanceError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for IssuanceError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => Self::StatusConflict {
                id,
                expected,
                actual,
            },
            StoreError::Missing { id } => Self::ProcedureNotFound { id },
            source => Self::StoreUnavailable { source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_invalid_grant_carries_no_detail() {
        let err = IssuanceError::InvalidGrant;
        assert_eq!(err.to_string(), "Invalid pre-authorized grant");
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_store_errors_are_retryable() {
        let unavailable: IssuanceError = StoreError::Unavailable {
            reason: "connection reset".to_string(),
        }
        .into();
        assert!(unavailable.is_retryable());
        assert!(unavailable.source().is_some());

        assert!(!IssuanceError::OfferNotFound.is_retryable());
        assert!(
            !IssuanceError::UnsupportedCredentialType {
                credential_type: "X".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_conflict_converts_to_status_conflict() {
        let id = ProcedureId::new();
        let err: IssuanceError = StoreError::Conflict {
            id: id.clone(),
            expected: CredentialStatus::PendSignature,
            actual: CredentialStatus::Revoked,
        }
        .into();

        assert!(matches!(
            err,
            IssuanceError::StatusConflict {
                expected: CredentialStatus::PendSignature,
                actual: CredentialStatus::Revoked,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::IllegalStatusTransition);
    }

    #[test]
    fn test_missing_procedure_converts_to_not_found() {
        let id = ProcedureId::new();
        let err: IssuanceError = StoreError::Missing { id: id.clone() }.into();
        assert!(matches!(err, IssuanceError::ProcedureNotFound { id: ref found } if *found == id));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_illegal_transition_display() {
        let err = IssuanceError::IllegalStatusTransition {
            from: CredentialStatus::Expired,
            to: CredentialStatus::Valid,
        };
        assert_eq!(
            err.to_string(),
            "Illegal status transition from EXPIRED to VALID"
        );
    }
}
