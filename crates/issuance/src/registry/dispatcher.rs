//! Mapper and binder lookup by credential type
//!
//! The table is built once through [`CredentialTypeDispatcherBuilder`] and
//! is read-only afterwards.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::{AuthContext, CreationRequest, IssuanceError, Result};

/// Credential types the issuer knows how to map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialType {
    /// Employee mandate credential
    LearCredentialEmployee,
    /// Machine (device/service) mandate credential
    LearCredentialMachine,
    /// Product or organization certification
    VerifiableCertification,
}

impl CredentialType {
    /// Every supported type
    pub const ALL: [CredentialType; 3] = [
        Self::LearCredentialEmployee,
        Self::LearCredentialMachine,
        Self::VerifiableCertification,
    ];

    /// Type tag as it appears in requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LearCredentialEmployee => "LEARCredentialEmployee",
            Self::LearCredentialMachine => "LEARCredentialMachine",
            Self::VerifiableCertification => "VerifiableCertification",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = IssuanceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| IssuanceError::UnsupportedCredentialType {
                credential_type: s.to_string(),
            })
    }
}

/// Type-specific payload mapper
#[async_trait]
pub trait CredentialMapper: Send + Sync {
    /// Type this mapper handles
    fn credential_type(&self) -> CredentialType;

    /// Turn a raw request payload into a normalized creation request
    async fn map(&self, raw_payload: Value, auth: &AuthContext) -> Result<CreationRequest>;
}

/// Post-hoc subject binding for types that support it
pub trait SubjectBinder: Send + Sync {
    /// Type this binder handles
    fn credential_type(&self) -> CredentialType;

    /// Rewrite a serialized credential to embed `subject_id`
    fn bind(&self, credential: &str, subject_id: &str) -> Result<String>;
}

/// Dispatch table from type tag to mapper and binder
///
/// Built once via [`CredentialTypeDispatcher::builder`] and immutable
/// afterwards. Holds no type-specific logic of its own.
#[derive(Clone, Default)]
pub struct CredentialTypeDispatcher {
    mappers: HashMap<CredentialType, Arc<dyn CredentialMapper>>,
    binders: HashMap<CredentialType, Arc<dyn SubjectBinder>>,
}

impl CredentialTypeDispatcher {
    /// Start building a dispatch table
    pub fn builder() -> CredentialTypeDispatcherBuilder {
        CredentialTypeDispatcherBuilder::default()
    }

    /// Map a raw payload through the mapper registered for `credential_type`
    #[instrument(skip(self, raw_payload, auth), fields(organization = %auth.organization))]
    pub async fn map_to_creation_request(
        &self,
        process_id: &str,
        credential_type: &str,
        raw_payload: Value,
        auth: &AuthContext,
    ) -> Result<CreationRequest> {
        let parsed = CredentialType::from_str(credential_type)?;
        let mapper = self.mappers.get(&parsed).ok_or_else(|| {
            IssuanceError::UnsupportedCredentialType {
                credential_type: credential_type.to_string(),
            }
        })?;

        let mut request = mapper.map(raw_payload, auth).await?;
        request.credential_type = parsed.as_str().to_string();
        debug!("Credential request mapped");
        Ok(request)
    }

    /// Embed `subject_id` into a serialized credential of `credential_type`
    pub fn bind_subject(
        &self,
        credential_type: &str,
        credential: &str,
        subject_id: &str,
    ) -> Result<String> {
        let parsed = CredentialType::from_str(credential_type)?;
        let binder = self.binders.get(&parsed).ok_or_else(|| {
            IssuanceError::UnsupportedCredentialType {
                credential_type: credential_type.to_string(),
            }
        })?;
        binder.bind(credential, subject_id)
    }

    /// Types with a registered mapper
    pub fn supported_types(&self) -> Vec<CredentialType> {
        let mut types: Vec<_> = self.mappers.keys().copied().collect();
        types.sort_by_key(CredentialType::as_str);
        types
    }
}

/// Builder for [`CredentialTypeDispatcher`]
#[derive(Default)]
pub struct CredentialTypeDispatcherBuilder {
    mappers: HashMap<CredentialType, Arc<dyn CredentialMapper>>,
    binders: HashMap<CredentialType, Arc<dyn SubjectBinder>>,
}

impl CredentialTypeDispatcherBuilder {
    /// Register a mapper, replacing any previous one for the same type
    pub fn mapper(mut self, mapper: Arc<dyn CredentialMapper>) -> Self {
        self.mappers.insert(mapper.credential_type(), mapper);
        self
    }

    /// Register a subject binder, replacing any previous one for the same type
    pub fn binder(mut self, binder: Arc<dyn SubjectBinder>) -> Self {
        self.binders.insert(binder.credential_type(), binder);
        self
    }

    /// Freeze the dispatch table
    pub fn build(self) -> CredentialTypeDispatcher {
        CredentialTypeDispatcher {
            mappers: self.mappers,
            binders: self.binders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeliveryMode, OrganizationId, SignatureFormat, SigningMode};
    use serde_json::json;

    struct EchoMapper;

    #[async_trait]
    impl CredentialMapper for EchoMapper {
        fn credential_type(&self) -> CredentialType {
            CredentialType::LearCredentialEmployee
        }

        async fn map(&self, raw_payload: Value, auth: &AuthContext) -> Result<CreationRequest> {
            Ok(CreationRequest {
                credential_type: String::new(),
                organization: auth.organization.clone(),
                payload: raw_payload,
                signature_format: SignatureFormat::Jades,
                valid_until: None,
                signing_mode: SigningMode::Deferred,
                delivery_mode: DeliveryMode::Direct,
            })
        }
    }

    struct SuffixBinder;

    impl SubjectBinder for SuffixBinder {
        fn credential_type(&self) -> CredentialType {
            CredentialType::LearCredentialEmployee
        }

        fn bind(&self, credential: &str, subject_id: &str) -> Result<String> {
            Ok(format!("{credential}#{subject_id}"))
        }
    }

    fn auth() -> AuthContext {
        AuthContext::new("user-1", OrganizationId::new("org-a").unwrap())
    }

    #[test]
    fn test_type_tags_roundtrip() {
        for t in CredentialType::ALL {
            assert_eq!(CredentialType::from_str(t.as_str()).unwrap(), t);
        }
        assert!(matches!(
            CredentialType::from_str("learcredentialemployee"),
            Err(IssuanceError::UnsupportedCredentialType { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_mapper() {
        let dispatcher = CredentialTypeDispatcher::builder()
            .mapper(Arc::new(EchoMapper))
            .build();

        let request = dispatcher
            .map_to_creation_request("p-1", "LEARCredentialEmployee", json!({"a": 1}), &auth())
            .await
            .unwrap();

        assert_eq!(request.credential_type, "LEARCredentialEmployee");
        assert_eq!(request.payload, json!({"a": 1}));
        assert_eq!(
            dispatcher.supported_types(),
            vec![CredentialType::LearCredentialEmployee]
        );
    }

    #[tokio::test]
    async fn test_known_type_without_mapper_is_unsupported() {
        let dispatcher = CredentialTypeDispatcher::builder()
            .mapper(Arc::new(EchoMapper))
            .build();

        let result = dispatcher
            .map_to_creation_request("p-1", "VerifiableCertification", json!({}), &auth())
            .await;
        assert!(matches!(
            result,
            Err(IssuanceError::UnsupportedCredentialType { credential_type })
                if credential_type == "VerifiableCertification"
        ));
    }

    #[test]
    fn test_bind_subject() {
        let dispatcher = CredentialTypeDispatcher::builder()
            .binder(Arc::new(SuffixBinder))
            .build();

        assert_eq!(
            dispatcher
                .bind_subject("LEARCredentialEmployee", "cred", "did:key:z6Mk")
                .unwrap(),
            "cred#did:key:z6Mk"
        );
        assert!(matches!(
            dispatcher.bind_subject("LEARCredentialMachine", "cred", "did:key:z6Mk"),
            Err(IssuanceError::UnsupportedCredentialType { .. })
        ));
    }
}
