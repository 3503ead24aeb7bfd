//! Guarded status transitions
//!
//! [`Lifecycle`] is the only code path that writes a procedure status. Each
//! transition is an optimistic read-modify-write: the new row is validated
//! against [`CredentialStatus::can_transition_to`] and persisted with
//! [`ProcedureStore::update_if_status`] conditioned on the status that was
//! read. A concurrent writer makes the guard fail with
//! [`IssuanceError::StatusConflict`] instead of being overwritten.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{
    Clock, CredentialId, CredentialProcedure, CredentialStatus, IssuanceError, ProcedureId, Result,
};
use crate::traits::ProcedureStore;

/// Executes status transitions against a [`ProcedureStore`]
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn ProcedureStore>,
    clock: Arc<dyn Clock>,
}

impl Lifecycle {
    /// Create a lifecycle executor
    pub fn new(store: Arc<dyn ProcedureStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Load a procedure, failing with `ProcedureNotFound` if absent
    pub async fn load(&self, id: &ProcedureId) -> Result<CredentialProcedure> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| IssuanceError::ProcedureNotFound { id: id.clone() })
    }

    /// Load and transition a procedure
    pub async fn advance(
        &self,
        id: &ProcedureId,
        target: CredentialStatus,
    ) -> Result<CredentialProcedure> {
        let procedure = self.load(id).await?;
        self.transition(procedure, target, |_| Ok(())).await
    }

    /// Transition an already loaded procedure
    ///
    /// `mutate` may change any field except `status`, `credential_id` and
    /// `updated_at`, which this method owns. The credential ID is assigned
    /// here on the ISSUED transition and never reassigned.
    pub async fn transition<F>(
        &self,
        procedure: CredentialProcedure,
        target: CredentialStatus,
        mutate: F,
    ) -> Result<CredentialProcedure>
    where
        F: FnOnce(&mut CredentialProcedure) -> Result<()> + Send,
    {
        let expected = procedure.status;
        let next = expected.transition_to(target)?;
        let credential_id = procedure.credential_id.clone();

        let mut updated = procedure;
        mutate(&mut updated)?;
        updated.status = next;
        updated.credential_id = match (credential_id, next) {
            (Some(existing), _) => Some(existing),
            (None, CredentialStatus::Issued) => Some(CredentialId::new()),
            (None, _) => None,
        };
        updated.updated_at = self.clock.now();

        self.store.update_if_status(expected, &updated).await?;

        debug!(
            procedure_id = %updated.procedure_id,
            from = %expected,
            to = %next,
            "Procedure status transitioned"
        );
        Ok(updated)
    }

    /// Record a signed artifact and move the procedure past ISSUED
    ///
    /// Performs `current → ISSUED` followed by `ISSUED → VALID` or
    /// `ISSUED → PEND_DOWNLOAD` per the procedure's delivery mode. If the
    /// second hop loses a race (e.g. a concurrent revoke), the ISSUED row is
    /// kept and returned.
    pub async fn issue(
        &self,
        procedure: CredentialProcedure,
        signed_artifact: String,
    ) -> Result<CredentialProcedure> {
        let delivery_status = procedure.delivery_mode.status_after_issue();
        let issued = self
            .transition(procedure, CredentialStatus::Issued, move |p| {
                p.signed_credential = Some(signed_artifact);
                Ok(())
            })
            .await?;

        match self
            .transition(issued.clone(), delivery_status, |_| Ok(()))
            .await
        {
            Ok(delivered) => Ok(delivered),
            Err(e @ IssuanceError::StatusConflict { .. }) => {
                warn!(
                    procedure_id = %issued.procedure_id,
                    error = %e,
                    "Issued procedure changed before delivery transition"
                );
                Ok(issued)
            }
            Err(e) => Err(e),
        }
    }
}
