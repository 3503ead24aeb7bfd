//! Typed identifiers
//!
//! [`ProcedureId`] and [`CredentialId`] are UUID v4 newtypes so the two can
//! never be swapped at a call site. [`OrganizationId`] wraps the tenant
//! identifier supplied by the identity provider and is validated on
//! construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::IssuanceError;

/// Maximum length for organization identifiers
const MAX_ORGANIZATION_LENGTH: usize = 255;

/// Opaque handle of one issuance attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureId(Uuid);

impl ProcedureId {
    /// Generate a fresh random procedure ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a procedure ID received from a client or signer
    pub fn parse(value: &str) -> Result<Self, IssuanceError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|e| IssuanceError::Validation(format!("invalid procedure id '{value}': {e}")))
    }
}

impl Default for ProcedureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a minted credential artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(Uuid);

impl CredentialId {
    /// Generate a fresh random credential ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a credential ID
    pub fn parse(value: &str) -> Result<Self, IssuanceError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|e| IssuanceError::Validation(format!("invalid credential id '{value}': {e}")))
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owning tenant of a procedure (validated)
///
/// Must be non-empty, at most 255 characters, and free of whitespace and
/// control characters. Organization identifiers are typically of the form
/// `VATES-B12345678`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrganizationId(String);

impl OrganizationId {
    /// Create a validated organization identifier
    pub fn new(id: impl Into<String>) -> Result<Self, IssuanceError> {
        let id = id.into();

        if id.is_empty() {
            return Err(IssuanceError::Validation(
                "organization identifier cannot be empty".to_string(),
            ));
        }

        if id.len() > MAX_ORGANIZATION_LENGTH {
            return Err(IssuanceError::Validation(format!(
                "organization identifier exceeds maximum length of {MAX_ORGANIZATION_LENGTH} characters"
            )));
        }

        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IssuanceError::Validation(format!(
                "organization identifier '{}' contains whitespace or control characters",
                id.escape_debug()
            )));
        }

        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<OrganizationId> for String {
    fn from(id: OrganizationId) -> Self {
        id.0
    }
}

impl TryFrom<String> for OrganizationId {
    type Error = IssuanceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_ids_are_unique() {
        assert_ne!(ProcedureId::new(), ProcedureId::new());
    }

    #[test]
    fn test_procedure_id_parse_roundtrip() {
        let id = ProcedureId::new();
        let parsed = ProcedureId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        assert!(ProcedureId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_credential_id_parse() {
        let id = CredentialId::new();
        assert_eq!(CredentialId::parse(&id.to_string()).unwrap(), id);

        let err = CredentialId::parse("42").unwrap_err();
        assert!(matches!(err, IssuanceError::Validation(msg) if msg.contains("credential id '42'")));
    }

    #[test]
    fn test_valid_organization_ids() {
        assert!(OrganizationId::new("VATES-B12345678").is_ok());
        assert!(OrganizationId::new("org_1").is_ok());
        assert!(OrganizationId::new("a".repeat(255)).is_ok());
    }

    #[test]
    fn test_invalid_organization_ids() {
        assert!(OrganizationId::new("").is_err());
        assert!(OrganizationId::new("a".repeat(256)).is_err());
        assert!(OrganizationId::new("org with spaces").is_err());
        assert!(OrganizationId::new("org\n1").is_err());
    }

    #[test]
    fn test_organization_id_serde() {
        let id = OrganizationId::new("VATES-B12345678").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"VATES-B12345678\"");

        let back: OrganizationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let invalid: Result<OrganizationId, _> = serde_json::from_str("\"\"");
        assert!(invalid.is_err());
    }
}
