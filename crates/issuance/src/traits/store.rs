//! Procedure and ephemeral store traits
//!
//! [`ProcedureStore`] guards every status change with a compare-and-set on
//! the stored status. [`EphemeralStore`] holds single-use TTL entries whose
//! `take` is an atomic get-and-delete.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::core::{
    CredentialId, CredentialProcedure, CredentialStatus, OrganizationId, ProcedureId, StoreResult,
};

/// Durable procedure storage
///
/// Indexed by procedure ID, credential ID, and `(organization, status)`.
/// Rows are never physically deleted.
#[async_trait]
pub trait ProcedureStore: Send + Sync {
    /// Insert a new procedure; fails with `StoreError::Duplicate` if the ID exists
    async fn insert(&self, procedure: &CredentialProcedure) -> StoreResult<()>;

    /// Load a procedure by ID
    async fn get(&self, id: &ProcedureId) -> StoreResult<Option<CredentialProcedure>>;

    /// Load the procedure that minted a credential
    async fn find_by_credential_id(
        &self,
        id: &CredentialId,
    ) -> StoreResult<Option<CredentialProcedure>>;

    /// Procedures of one organization, optionally filtered by status
    async fn list_by_organization(
        &self,
        organization: &OrganizationId,
        status: Option<CredentialStatus>,
    ) -> StoreResult<Vec<CredentialProcedure>>;

    /// Filtered scan over all organizations
    async fn list_by_status(
        &self,
        statuses: &[CredentialStatus],
    ) -> StoreResult<Vec<CredentialProcedure>>;

    /// Replace a row only if its stored status still equals `expected`
    ///
    /// Fails with `StoreError::Conflict` when the guard does not hold and
    /// `StoreError::Missing` when the row does not exist.
    async fn update_if_status(
        &self,
        expected: CredentialStatus,
        procedure: &CredentialProcedure,
    ) -> StoreResult<()>;
}

/// Short-TTL key-value storage with single-use reads
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Store a value that becomes invisible after `ttl`
    ///
    /// Fails with `StoreError::Duplicate` if a live entry already holds `key`.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> StoreResult<()>;

    /// Atomically read and delete an entry
    ///
    /// Of any number of concurrent callers for the same key, at most one
    /// observes `Some`. Expired entries read as `None`.
    async fn take(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Physically drop expired entries, returning how many were removed
    ///
    /// Backends with native expiry have nothing to do and keep the default.
    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }
}
