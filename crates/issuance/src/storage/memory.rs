//! In-memory procedure storage

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::core::{
    CredentialId, CredentialProcedure, CredentialStatus, OrganizationId, ProcedureId, StoreError,
    StoreResult,
};
use crate::traits::ProcedureStore;

/// In-memory implementation of [`ProcedureStore`]
///
/// Conditional writes hold the shard lock of the target row for the whole
/// compare-and-set, so two writers guarded on the same prior status cannot
/// both succeed.
#[derive(Default)]
pub struct MemoryProcedureStore {
    procedures: DashMap<ProcedureId, CredentialProcedure>,
    by_credential: DashMap<CredentialId, ProcedureId>,
}

impl MemoryProcedureStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored procedures
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    fn collect_where(&self, keep: impl Fn(&CredentialProcedure) -> bool) -> Vec<CredentialProcedure> {
        self.procedures
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl ProcedureStore for MemoryProcedureStore {
    async fn insert(&self, procedure: &CredentialProcedure) -> StoreResult<()> {
        match self.procedures.entry(procedure.procedure_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                key: procedure.procedure_id.to_string(),
            }),
            Entry::Vacant(entry) => {
                if let Some(credential_id) = &procedure.credential_id {
                    self.by_credential
                        .insert(credential_id.clone(), procedure.procedure_id.clone());
                }
                entry.insert(procedure.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &ProcedureId) -> StoreResult<Option<CredentialProcedure>> {
        Ok(self.procedures.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_credential_id(
        &self,
        id: &CredentialId,
    ) -> StoreResult<Option<CredentialProcedure>> {
        let Some(procedure_id) = self.by_credential.get(id).map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };
        self.get(&procedure_id).await
    }

    async fn list_by_organization(
        &self,
        organization: &OrganizationId,
        status: Option<CredentialStatus>,
    ) -> StoreResult<Vec<CredentialProcedure>> {
        Ok(self.collect_where(|p| {
            &p.organization == organization && status.is_none_or(|s| p.status == s)
        }))
    }

    async fn list_by_status(
        &self,
        statuses: &[CredentialStatus],
    ) -> StoreResult<Vec<CredentialProcedure>> {
        Ok(self.collect_where(|p| statuses.contains(&p.status)))
    }

    async fn update_if_status(
        &self,
        expected: CredentialStatus,
        procedure: &CredentialProcedure,
    ) -> StoreResult<()> {
        let Some(mut current) = self.procedures.get_mut(&procedure.procedure_id) else {
            return Err(StoreError::Missing {
                id: procedure.procedure_id.clone(),
            });
        };

        if current.status != expected {
            return Err(StoreError::Conflict {
                id: procedure.procedure_id.clone(),
                expected,
                actual: current.status,
            });
        }

        if current.credential_id.is_none() {
            if let Some(credential_id) = &procedure.credential_id {
                self.by_credential
                    .insert(credential_id.clone(), procedure.procedure_id.clone());
            }
        }

        *current = procedure.clone();
        Ok(())
    }
}
