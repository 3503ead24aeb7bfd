//! Issuance engine facade
//!
//! [`IssuanceEngine`] wires the stores, clock, dispatcher and configuration
//! into the individual components and exposes every inbound operation
//! through one handle. It is cheap to clone; clones share state.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::core::{
    AuthContext, Clock, CredentialId, CredentialProcedure, CredentialStatus, IssuanceError,
    OrganizationId, PendingCredential, ProcedureId, Result, SignatureFormat, SignedCredential,
    SystemClock,
};
use crate::expiration::CredentialExpirationScheduler;
use crate::grant::{PreAuthorizationGrant, PreAuthorizedCodeIssuer};
use crate::lifecycle::Lifecycle;
use crate::offer::CredentialOfferCache;
use crate::registry::CredentialTypeDispatcher;
use crate::signing::{DeferredCredentialWorkflow, SignedBatchReport, artifact};
use crate::storage::{EphemeralPurger, MemoryEphemeralStore, MemoryProcedureStore};
use crate::traits::{EphemeralStore, ProcedureStore};

/// Credential issuance and lifecycle engine
#[derive(Clone)]
pub struct IssuanceEngine {
    procedures: Arc<dyn ProcedureStore>,
    clock: Arc<dyn Clock>,
    lifecycle: Lifecycle,
    offers: CredentialOfferCache,
    grants: PreAuthorizedCodeIssuer,
    dispatcher: CredentialTypeDispatcher,
    deferred: DeferredCredentialWorkflow,
    purger: EphemeralPurger,
    config: EngineConfig,
}

impl IssuanceEngine {
    /// Start building an engine
    pub fn builder() -> IssuanceEngineBuilder {
        IssuanceEngineBuilder::default()
    }

    /// Effective configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- offers -------------------------------------------------------

    /// Cache an offer and return its nonce
    pub async fn create_offer(&self, payload: Value) -> Result<String> {
        self.offers.create(payload).await
    }

    /// Redeem an offer nonce exactly once
    pub async fn redeem_offer(&self, nonce: &str) -> Result<Value> {
        self.offers.redeem(nonce).await
    }

    // ---- grants -------------------------------------------------------

    /// Mint a pre-authorization grant for `credential_id`
    pub async fn issue_grant(
        &self,
        process_id: &str,
        credential_id: &CredentialId,
    ) -> Result<PreAuthorizationGrant> {
        self.grants.issue(process_id, credential_id).await
    }

    /// Exchange a pre-authorized code and PIN for a credential ID
    pub async fn redeem_grant(&self, pre_authorized_code: &str, tx_code: &str) -> Result<CredentialId> {
        self.grants.redeem(pre_authorized_code, tx_code).await
    }

    // ---- procedures ---------------------------------------------------

    /// Map a raw request and persist a new procedure
    ///
    /// The procedure starts in DRAFT or PEND_SIGNATURE depending on the
    /// mapped request's signing mode. The mapped organization must be the
    /// caller's own.
    #[instrument(skip(self, raw_payload, auth), fields(organization = %auth.organization))]
    pub async fn create_procedure(
        &self,
        process_id: &str,
        credential_type: &str,
        raw_payload: Value,
        auth: &AuthContext,
    ) -> Result<ProcedureId> {
        let request = self
            .dispatcher
            .map_to_creation_request(process_id, credential_type, raw_payload, auth)
            .await?;

        if request.organization != auth.organization {
            return Err(IssuanceError::Validation(format!(
                "mapped organization '{}' does not match caller organization '{}'",
                request.organization, auth.organization
            )));
        }

        let procedure = CredentialProcedure::from_request(request, self.clock.now());
        self.procedures.insert(&procedure).await?;

        info!(
            procedure_id = %procedure.procedure_id,
            credential_type = %procedure.credential_type,
            status = %procedure.status,
            "Credential procedure created"
        );
        Ok(procedure.procedure_id)
    }

    /// Load a procedure
    pub async fn get_procedure(&self, id: &ProcedureId) -> Result<CredentialProcedure> {
        self.lifecycle.load(id).await
    }

    /// Procedures of `organization`, optionally filtered by status, newest first
    pub async fn list_procedures(
        &self,
        organization: &OrganizationId,
        status: Option<CredentialStatus>,
    ) -> Result<Vec<CredentialProcedure>> {
        let mut procedures = self
            .procedures
            .list_by_organization(organization, status)
            .await?;
        procedures.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(procedures)
    }

    /// Look up the procedure that issued `credential_id`
    pub async fn find_by_credential_id(
        &self,
        credential_id: &CredentialId,
    ) -> Result<CredentialProcedure> {
        self.procedures
            .find_by_credential_id(credential_id)
            .await?
            .ok_or_else(|| IssuanceError::CredentialNotFound {
                id: credential_id.to_string(),
            })
    }

    // ---- signing ------------------------------------------------------

    /// Procedures of `organization` awaiting the external signer
    pub async fn list_pending(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<PendingCredential>> {
        self.deferred.list_pending(organization).await
    }

    /// Apply a batch of signer results
    pub async fn apply_signed(&self, signed: Vec<SignedCredential>) -> SignedBatchReport {
        self.deferred.apply_signed(signed).await
    }

    /// Hand a DRAFT procedure to the external signer
    #[instrument(skip(self))]
    pub async fn request_signature(&self, id: &ProcedureId) -> Result<CredentialProcedure> {
        self.lifecycle
            .advance(id, CredentialStatus::PendSignature)
            .await
    }

    /// Record an in-band signature for a DRAFT procedure
    #[instrument(skip(self, signed_artifact))]
    pub async fn complete_signature(
        &self,
        id: &ProcedureId,
        signed_artifact: String,
        format: SignatureFormat,
    ) -> Result<CredentialProcedure> {
        let procedure = self.lifecycle.load(id).await?;

        if procedure.status != CredentialStatus::Draft {
            return Err(IssuanceError::IllegalStatusTransition {
                from: procedure.status,
                to: CredentialStatus::Issued,
            });
        }
        if procedure.signature_format != format {
            return Err(IssuanceError::format_mismatch(
                id,
                procedure.signature_format,
                format,
            ));
        }
        artifact::check_shape(format, &signed_artifact)
            .map_err(|reason| IssuanceError::signature_mismatch(id, reason))?;

        let issued = self.lifecycle.issue(procedure, signed_artifact).await?;
        info!(procedure_id = %id, status = %issued.status, "Credential signed in-band");
        Ok(issued)
    }

    /// Embed `subject_id` into a serialized credential
    pub fn bind_subject(
        &self,
        credential_type: &str,
        credential: &str,
        subject_id: &str,
    ) -> Result<String> {
        self.dispatcher
            .bind_subject(credential_type, credential, subject_id)
    }

    // ---- holder delivery and revocation -------------------------------

    /// Return the signed artifact for `credential_id`
    ///
    /// The first retrieval of a PEND_DOWNLOAD credential moves it to VALID.
    /// Revoked, expired and unsigned credentials are not retrievable.
    #[instrument(skip(self))]
    pub async fn retrieve_credential(&self, credential_id: &CredentialId) -> Result<String> {
        let procedure = self.find_by_credential_id(credential_id).await?;
        let not_found = || IssuanceError::CredentialNotFound {
            id: credential_id.to_string(),
        };

        if !procedure.status.is_signed() {
            return Err(not_found());
        }

        let procedure = if procedure.status == CredentialStatus::PendDownload {
            match self
                .lifecycle
                .transition(procedure, CredentialStatus::Valid, |_| Ok(()))
                .await
            {
                Ok(delivered) => {
                    info!(procedure_id = %delivered.procedure_id, "Credential downloaded");
                    delivered
                }
                // A concurrent retrieval got there first
                Err(IssuanceError::StatusConflict {
                    actual: CredentialStatus::Valid,
                    ..
                }) => self.find_by_credential_id(credential_id).await?,
                Err(e) => return Err(e),
            }
        } else {
            procedure
        };

        procedure.signed_credential.ok_or_else(not_found)
    }

    /// Revoke an issued credential
    #[instrument(skip(self))]
    pub async fn revoke(&self, id: &ProcedureId) -> Result<CredentialProcedure> {
        let revoked = self.lifecycle.advance(id, CredentialStatus::Revoked).await?;
        info!(procedure_id = %id, "Credential revoked");
        Ok(revoked)
    }

    // ---- background tasks ---------------------------------------------

    /// Expiration scheduler over this engine's procedure store
    pub fn expiration_scheduler(&self) -> CredentialExpirationScheduler {
        CredentialExpirationScheduler::new(
            self.procedures.clone(),
            self.lifecycle.clone(),
            self.clock.clone(),
            self.config.expiration.clone(),
        )
    }

    /// Purger over this engine's offer and grant stores
    pub fn purger(&self) -> EphemeralPurger {
        self.purger.clone()
    }

    /// Drop expired offers and grants now, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.purger.purge_once().await
    }

    /// Spawn the purger and, when enabled, the expiration scheduler
    ///
    /// Both stop when `shutdown` is cancelled.
    pub fn spawn_background(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.purger().spawn(shutdown.clone())];
        let scheduler = self.expiration_scheduler();
        if scheduler.is_enabled() {
            handles.push(scheduler.spawn(shutdown));
        } else {
            info!("Expiration sweep disabled");
        }
        handles
    }
}

/// Builder for [`IssuanceEngine`]
///
/// Unset stores default to the in-memory backends and the clock defaults to
/// [`SystemClock`].
#[derive(Default)]
pub struct IssuanceEngineBuilder {
    procedure_store: Option<Arc<dyn ProcedureStore>>,
    offer_store: Option<Arc<dyn EphemeralStore>>,
    grant_store: Option<Arc<dyn EphemeralStore>>,
    clock: Option<Arc<dyn Clock>>,
    dispatcher: Option<CredentialTypeDispatcher>,
    config: Option<EngineConfig>,
}

impl IssuanceEngineBuilder {
    /// Set the durable procedure store
    pub fn procedure_store(mut self, store: Arc<dyn ProcedureStore>) -> Self {
        self.procedure_store = Some(store);
        self
    }

    /// Set the short-TTL store for offers
    pub fn offer_store(mut self, store: Arc<dyn EphemeralStore>) -> Self {
        self.offer_store = Some(store);
        self
    }

    /// Set the short-TTL store for grants
    pub fn grant_store(mut self, store: Arc<dyn EphemeralStore>) -> Self {
        self.grant_store = Some(store);
        self
    }

    /// Set the time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the credential type dispatch table
    pub fn dispatcher(mut self, dispatcher: CredentialTypeDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<IssuanceEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let procedures: Arc<dyn ProcedureStore> = self
            .procedure_store
            .unwrap_or_else(|| Arc::new(MemoryProcedureStore::new()));
        let offer_store: Arc<dyn EphemeralStore> = self
            .offer_store
            .unwrap_or_else(|| Arc::new(MemoryEphemeralStore::new(clock.clone())));
        let grant_store: Arc<dyn EphemeralStore> = self
            .grant_store
            .unwrap_or_else(|| Arc::new(MemoryEphemeralStore::new(clock.clone())));

        let lifecycle = Lifecycle::new(procedures.clone(), clock.clone());
        let purger = EphemeralPurger::new(config.purge_interval)
            .with_store("offers", offer_store.clone())
            .with_store("grants", grant_store.clone());

        Ok(IssuanceEngine {
            offers: CredentialOfferCache::new(offer_store, config.offer_ttl),
            grants: PreAuthorizedCodeIssuer::new(
                grant_store,
                clock.clone(),
                config.grant_ttl,
                config.tx_code_length,
            ),
            deferred: DeferredCredentialWorkflow::new(procedures.clone(), lifecycle.clone()),
            dispatcher: self.dispatcher.unwrap_or_default(),
            purger,
            procedures,
            clock,
            lifecycle,
            config,
        })
    }
}
