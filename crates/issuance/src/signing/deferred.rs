//! Deferred (external signer) issuance
//!
//! The signer polls [`DeferredCredentialWorkflow::list_pending`] for
//! procedures in PEND_SIGNATURE and posts results back through
//! [`DeferredCredentialWorkflow::apply_signed`].
//!
//! Batches use a collect-all policy: each item is validated and committed on
//! its own, and failures are gathered into the [`SignedBatchReport`] rather
//! than aborting the remaining items.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::{
    CredentialStatus, IssuanceError, OrganizationId, PendingCredential, ProcedureId, Result,
    SignedCredential,
};
use crate::lifecycle::Lifecycle;
use crate::signing::artifact;
use crate::traits::ProcedureStore;

/// Per-item outcome of a signer callback batch
#[derive(Debug, Default)]
pub struct SignedBatchReport {
    /// Procedures that moved to ISSUED (and onward)
    pub applied: Vec<ProcedureId>,
    /// Items that were rejected, in submission order
    pub failures: Vec<(ProcedureId, IssuanceError)>,
}

impl SignedBatchReport {
    /// Every item was applied
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Surfaces pending procedures to the signer and applies its results
#[derive(Clone)]
pub struct DeferredCredentialWorkflow {
    store: Arc<dyn ProcedureStore>,
    lifecycle: Lifecycle,
}

impl DeferredCredentialWorkflow {
    /// Create a workflow over `store`
    pub fn new(store: Arc<dyn ProcedureStore>, lifecycle: Lifecycle) -> Self {
        Self { store, lifecycle }
    }

    /// Procedures of `organization` awaiting a signature, newest first
    #[instrument(skip(self), fields(organization = %organization))]
    pub async fn list_pending(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<PendingCredential>> {
        let mut procedures = self
            .store
            .list_by_organization(organization, Some(CredentialStatus::PendSignature))
            .await?;
        procedures.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(procedures.into_iter().map(PendingCredential::from).collect())
    }

    /// Apply a batch of signer results
    #[instrument(skip_all, fields(batch_size = signed.len()))]
    pub async fn apply_signed(&self, signed: Vec<SignedCredential>) -> SignedBatchReport {
        let mut report = SignedBatchReport::default();

        for item in signed {
            let id = item.procedure_id.clone();
            match self.apply_one(item).await {
                Ok(()) => report.applied.push(id),
                Err(e) => {
                    warn!(
                        target: "security",
                        procedure_id = %id,
                        error = %e,
                        "Signed credential rejected"
                    );
                    report.failures.push((id, e));
                }
            }
        }

        info!(
            applied = report.applied.len(),
            failed = report.failures.len(),
            "Signed credential batch processed"
        );
        report
    }

    async fn apply_one(&self, item: SignedCredential) -> Result<()> {
        let id = item.procedure_id;
        let procedure = match self.lifecycle.load(&id).await {
            Ok(procedure) => procedure,
            Err(IssuanceError::ProcedureNotFound { .. }) => {
                return Err(IssuanceError::signature_mismatch(&id, "unknown procedure"));
            }
            Err(e) => return Err(e),
        };

        if procedure.status != CredentialStatus::PendSignature {
            return Err(IssuanceError::signature_mismatch(
                &id,
                format!("procedure is {}, not awaiting a signature", procedure.status),
            ));
        }
        if procedure.signature_format != item.format {
            return Err(IssuanceError::format_mismatch(
                &id,
                procedure.signature_format,
                item.format,
            ));
        }
        artifact::check_shape(item.format, &item.signed_artifact)
            .map_err(|reason| IssuanceError::signature_mismatch(&id, reason))?;

        match self.lifecycle.issue(procedure, item.signed_artifact).await {
            Ok(_) => Ok(()),
            Err(IssuanceError::StatusConflict { actual, .. }) => Err(
                IssuanceError::signature_mismatch(&id, format!("procedure moved to {actual} concurrently")),
            ),
            Err(e) => Err(e),
        }
    }
}
