//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use vcissuer_issuance::prelude::*;
use vcissuer_issuance::{EngineConfig, ManualClock, MemoryProcedureStore, StoreError, StoreResult};

/// Install a test-writer subscriber once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Employee mapper whose signing and delivery modes are fixed per test
///
/// Copies the raw payload verbatim and reads an optional `valid_until`
/// (RFC 3339) from it.
pub struct EmployeeMapper {
    pub signing_mode: SigningMode,
    pub delivery_mode: DeliveryMode,
}

#[async_trait]
impl CredentialMapper for EmployeeMapper {
    fn credential_type(&self) -> CredentialType {
        CredentialType::LearCredentialEmployee
    }

    async fn map(&self, raw_payload: Value, auth: &AuthContext) -> Result<CreationRequest> {
        let valid_until = raw_payload
            .get("valid_until")
            .and_then(Value::as_str)
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| IssuanceError::Mapping {
                credential_type: "LEARCredentialEmployee".to_string(),
                reason: e.to_string(),
            })?
            .map(|t| t.with_timezone(&Utc));

        Ok(CreationRequest {
            credential_type: "LEARCredentialEmployee".to_string(),
            organization: auth.organization.clone(),
            payload: raw_payload,
            signature_format: SignatureFormat::Jades,
            valid_until,
            signing_mode: self.signing_mode,
            delivery_mode: self.delivery_mode,
        })
    }
}

/// Binds the mandatee ID into an employee credential's JSON
pub struct MandateeBinder;

impl SubjectBinder for MandateeBinder {
    fn credential_type(&self) -> CredentialType {
        CredentialType::LearCredentialEmployee
    }

    fn bind(&self, credential: &str, subject_id: &str) -> Result<String> {
        let mut parsed: Value = serde_json::from_str(credential)
            .map_err(|e| IssuanceError::Validation(format!("credential is not JSON: {e}")))?;
        parsed["credentialSubject"]["mandate"]["mandatee"]["id"] = Value::from(subject_id);
        Ok(parsed.to_string())
    }
}

/// Ephemeral store whose backend is always down
pub struct UnavailableStore;

#[async_trait]
impl EphemeralStore for UnavailableStore {
    async fn put(&self, _key: &str, _value: Value, _ttl: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable {
            reason: "connection refused".to_string(),
        })
    }

    async fn take(&self, _key: &str) -> StoreResult<Option<Value>> {
        Err(StoreError::Unavailable {
            reason: "connection refused".to_string(),
        })
    }
}

/// Procedure store that lets a competing writer win once
///
/// After [`RacingStore::arm`], the next `get` or `list_by_status` returns
/// its snapshot as read, then moves the armed row to the target status
/// behind the caller's back. The caller's following conditional write sees
/// the row in a status it did not expect.
pub struct RacingStore {
    inner: MemoryProcedureStore,
    armed: Mutex<Option<(ProcedureId, CredentialStatus)>>,
}

impl RacingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryProcedureStore::new(),
            armed: Mutex::new(None),
        }
    }

    /// Move `id` to `target` right after the next read
    pub fn arm(&self, id: &ProcedureId, target: CredentialStatus) {
        *self.armed.lock() = Some((id.clone(), target));
    }

    async fn interfere(&self) {
        let armed = self.armed.lock().take();
        let Some((id, target)) = armed else {
            return;
        };
        let mut row = self
            .inner
            .get(&id)
            .await
            .unwrap()
            .expect("armed row exists");
        let expected = row.status;
        row.status = target;
        self.inner.update_if_status(expected, &row).await.unwrap();
    }
}

#[async_trait]
impl ProcedureStore for RacingStore {
    async fn insert(&self, procedure: &CredentialProcedure) -> StoreResult<()> {
        self.inner.insert(procedure).await
    }

    async fn get(&self, id: &ProcedureId) -> StoreResult<Option<CredentialProcedure>> {
        let snapshot = self.inner.get(id).await?;
        self.interfere().await;
        Ok(snapshot)
    }

    async fn find_by_credential_id(
        &self,
        id: &CredentialId,
    ) -> StoreResult<Option<CredentialProcedure>> {
        self.inner.find_by_credential_id(id).await
    }

    async fn list_by_organization(
        &self,
        organization: &OrganizationId,
        status: Option<CredentialStatus>,
    ) -> StoreResult<Vec<CredentialProcedure>> {
        self.inner.list_by_organization(organization, status).await
    }

    async fn list_by_status(
        &self,
        statuses: &[CredentialStatus],
    ) -> StoreResult<Vec<CredentialProcedure>> {
        let snapshot = self.inner.list_by_status(statuses).await?;
        self.interfere().await;
        Ok(snapshot)
    }

    async fn update_if_status(
        &self,
        expected: CredentialStatus,
        procedure: &CredentialProcedure,
    ) -> StoreResult<()> {
        self.inner.update_if_status(expected, procedure).await
    }
}

/// Engine over a [`RacingStore`]
pub fn racing_engine(
    signing_mode: SigningMode,
    delivery_mode: DeliveryMode,
    config: EngineConfig,
) -> (IssuanceEngine, Arc<RacingStore>, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(RacingStore::new());
    let engine = IssuanceEngine::builder()
        .clock(clock.clone())
        .procedure_store(store.clone())
        .dispatcher(dispatcher(signing_mode, delivery_mode))
        .config(config)
        .build()
        .expect("default config is valid");
    (engine, store, clock)
}

pub fn dispatcher(signing_mode: SigningMode, delivery_mode: DeliveryMode) -> CredentialTypeDispatcher {
    CredentialTypeDispatcher::builder()
        .mapper(Arc::new(EmployeeMapper {
            signing_mode,
            delivery_mode,
        }))
        .binder(Arc::new(MandateeBinder))
        .build()
}

/// Engine over in-memory stores and a manual clock
pub fn engine(signing_mode: SigningMode, delivery_mode: DeliveryMode) -> (IssuanceEngine, Arc<ManualClock>) {
    engine_with_config(signing_mode, delivery_mode, EngineConfig::default())
}

pub fn engine_with_config(
    signing_mode: SigningMode,
    delivery_mode: DeliveryMode,
    config: EngineConfig,
) -> (IssuanceEngine, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::default());
    let engine = IssuanceEngine::builder()
        .clock(clock.clone())
        .dispatcher(dispatcher(signing_mode, delivery_mode))
        .config(config)
        .build()
        .expect("default config is valid");
    (engine, clock)
}

pub fn org(id: &str) -> OrganizationId {
    OrganizationId::new(id).expect("valid organization id")
}

pub fn auth(organization: &str) -> AuthContext {
    AuthContext::new("user-1", org(organization))
}

/// Structurally valid compact JWS whose payload is `payload`
pub fn jws(payload: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"ES256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload),
        URL_SAFE_NO_PAD.encode("signature")
    )
}

pub fn signed(procedure_id: &ProcedureId, payload: &str) -> SignedCredential {
    SignedCredential {
        procedure_id: procedure_id.clone(),
        signed_artifact: jws(payload),
        format: SignatureFormat::Jades,
    }
}
