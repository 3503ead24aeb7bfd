//! Procedure records and the request/response shapes around them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::{CredentialId, CredentialStatus, OrganizationId, ProcedureId};

/// Declared signing scheme of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureFormat {
    /// CBOR Object Signing and Encryption
    #[serde(rename = "COSE")]
    Cose,
    /// JSON Advanced Electronic Signatures (compact JWS serialization)
    #[serde(rename = "JADES")]
    Jades,
}

impl fmt::Display for SignatureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cose => f.write_str("COSE"),
            Self::Jades => f.write_str("JADES"),
        }
    }
}

/// How the credential gets signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    /// Signed in-band by the caller; procedure starts in DRAFT
    Synchronous,
    /// Queued for the external signer; procedure starts in PEND_SIGNATURE
    #[default]
    Deferred,
}

impl SigningMode {
    /// Status a new procedure is created in
    pub fn initial_status(self) -> CredentialStatus {
        match self {
            Self::Synchronous => CredentialStatus::Draft,
            Self::Deferred => CredentialStatus::PendSignature,
        }
    }
}

/// What happens after the signed artifact is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Credential becomes VALID as soon as it is ISSUED
    #[default]
    Direct,
    /// Credential waits in PEND_DOWNLOAD until the holder fetches it
    Download,
}

impl DeliveryMode {
    /// Status that follows ISSUED
    pub fn status_after_issue(self) -> CredentialStatus {
        match self {
            Self::Direct => CredentialStatus::Valid,
            Self::Download => CredentialStatus::PendDownload,
        }
    }
}

/// Caller identity as established by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated subject (user or machine) identifier
    pub subject: String,
    /// Tenant the subject acts for
    pub organization: OrganizationId,
}

impl AuthContext {
    /// Create a new auth context
    pub fn new(subject: impl Into<String>, organization: OrganizationId) -> Self {
        Self {
            subject: subject.into(),
            organization,
        }
    }
}

/// Normalized request produced by a type-specific mapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationRequest {
    /// Type tag the request was mapped from
    pub credential_type: String,
    /// Owning tenant
    pub organization: OrganizationId,
    /// Mapper-specific credential subject data, stored as-is
    pub payload: Value,
    /// Signing scheme the signer must use
    pub signature_format: SignatureFormat,
    /// End of the validity window, if any
    pub valid_until: Option<DateTime<Utc>>,
    /// Synchronous or deferred signing
    #[serde(default)]
    pub signing_mode: SigningMode,
    /// Direct or download delivery
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
}

/// One issuance attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialProcedure {
    /// Immutable primary handle
    pub procedure_id: ProcedureId,
    /// Set exactly once, at the ISSUED transition
    pub credential_id: Option<CredentialId>,
    /// Owning tenant
    pub organization: OrganizationId,
    /// Type tag
    pub credential_type: String,
    /// Current lifecycle status
    pub status: CredentialStatus,
    /// Opaque credential subject data
    pub payload: Value,
    /// Declared signing scheme
    pub signature_format: SignatureFormat,
    /// Delivery path after issuance
    pub delivery_mode: DeliveryMode,
    /// Signed artifact, once recorded
    pub signed_credential: Option<String>,
    /// `None` means the scheduler never expires this credential
    pub valid_until: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl CredentialProcedure {
    /// Build a fresh procedure from a mapped request
    pub fn from_request(request: CreationRequest, now: DateTime<Utc>) -> Self {
        Self {
            procedure_id: ProcedureId::new(),
            credential_id: None,
            organization: request.organization,
            credential_type: request.credential_type,
            status: request.signing_mode.initial_status(),
            payload: request.payload,
            signature_format: request.signature_format,
            delivery_mode: request.delivery_mode,
            signed_credential: None,
            valid_until: request.valid_until,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validity window elapsed strictly before `now`
    pub fn is_past_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until < now)
    }
}

/// A procedure awaiting the external signer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCredential {
    /// Procedure the signed artifact must reference
    pub procedure_id: ProcedureId,
    /// Type tag
    pub credential_type: String,
    /// Unsigned credential payload
    pub payload: Value,
    /// Scheme the signer must use
    pub signature_format: SignatureFormat,
    /// When the procedure was created
    pub created_at: DateTime<Utc>,
}

impl From<CredentialProcedure> for PendingCredential {
    fn from(procedure: CredentialProcedure) -> Self {
        Self {
            procedure_id: procedure.procedure_id,
            credential_type: procedure.credential_type,
            payload: procedure.payload,
            signature_format: procedure.signature_format,
            created_at: procedure.created_at,
        }
    }
}

/// A signer callback item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCredential {
    /// Procedure the artifact was produced for
    pub procedure_id: ProcedureId,
    /// Signed credential, serialized per `format`
    pub signed_artifact: String,
    /// Scheme the signer used
    pub format: SignatureFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(signing_mode: SigningMode) -> CreationRequest {
        CreationRequest {
            credential_type: "LEARCredentialEmployee".to_string(),
            organization: OrganizationId::new("VATES-B12345678").unwrap(),
            payload: json!({"mandatee": {"email": "jane@example.org"}}),
            signature_format: SignatureFormat::Jades,
            valid_until: None,
            signing_mode,
            delivery_mode: DeliveryMode::Direct,
        }
    }

    #[test]
    fn test_initial_status_follows_signing_mode() {
        let now = Utc::now();
        let deferred = CredentialProcedure::from_request(request(SigningMode::Deferred), now);
        let sync = CredentialProcedure::from_request(request(SigningMode::Synchronous), now);

        assert_eq!(deferred.status, CredentialStatus::PendSignature);
        assert_eq!(sync.status, CredentialStatus::Draft);
        assert!(deferred.credential_id.is_none());
        assert_eq!(deferred.created_at, deferred.updated_at);
    }

    #[test]
    fn test_past_validity_is_strict() {
        let now = Utc::now();
        let mut procedure = CredentialProcedure::from_request(request(SigningMode::Deferred), now);

        assert!(!procedure.is_past_validity(now));

        procedure.valid_until = Some(now);
        assert!(!procedure.is_past_validity(now));

        procedure.valid_until = Some(now - chrono::Duration::seconds(1));
        assert!(procedure.is_past_validity(now));
    }

    #[test]
    fn test_creation_request_defaults() {
        let parsed: CreationRequest = serde_json::from_value(json!({
            "credential_type": "LEARCredentialEmployee",
            "organization": "VATES-B12345678",
            "payload": {},
            "signature_format": "COSE",
            "valid_until": null
        }))
        .unwrap();

        assert_eq!(parsed.signing_mode, SigningMode::Deferred);
        assert_eq!(parsed.delivery_mode, DeliveryMode::Direct);
        assert_eq!(parsed.signature_format, SignatureFormat::Cose);
    }
}
