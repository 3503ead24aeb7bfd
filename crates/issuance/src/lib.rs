//! vcissuer issuance - Verifiable credential issuance and lifecycle engine
//!
//! Mints, signs, delivers and retires verifiable credentials on behalf of
//! organizations.
//!
//! # Features
//!
//! - **Single-use offers** - nonce-addressed credential offers, redeemable once
//! - **Pre-authorized grants** - high-entropy code plus a numeric PIN, consumed on first use
//! - **Type dispatch** - credential-type specific mapping supplied by the host
//! - **Guarded lifecycle** - every status change is an optimistic conditional write
//! - **Deferred signing** - batch intake of externally signed artifacts
//! - **Expiration sweep** - background VALID to EXPIRED transitions
#![forbid(unsafe_code)]

/// Engine configuration
pub mod config;
/// Core types, errors, and primitives
pub mod core;
/// Engine facade wiring every component together
pub mod engine;
/// Validity-window expiration sweep
pub mod expiration;
/// Pre-authorized code and PIN grants
pub mod grant;
/// Guarded status transitions
pub mod lifecycle;
/// One-time credential offers
pub mod offer;
/// Credential type mapper and binder registry
pub mod registry;
/// Signed artifact intake
pub mod signing;
/// In-memory storage backends
pub mod storage;
/// Storage contracts
pub mod traits;

// ── Root re-exports ─────────────────────────────────────────────────────────

pub use crate::config::{EngineConfig, ExpirationConfig, ExpirationSchedule};
pub use crate::core::{
    AuthContext, Clock, CreationRequest, CredentialId, CredentialProcedure, CredentialStatus,
    DeliveryMode, ErrorKind, IssuanceError, ManualClock, OrganizationId, PendingCredential,
    ProcedureId, Result, SignatureFormat, SignedCredential, SigningMode, StoreError, StoreResult,
    SystemClock,
};
pub use crate::engine::{IssuanceEngine, IssuanceEngineBuilder};
pub use crate::expiration::{CredentialExpirationScheduler, SweepReport};
pub use crate::grant::{PreAuthorizationGrant, PreAuthorizedCodeIssuer};
pub use crate::lifecycle::Lifecycle;
pub use crate::offer::CredentialOfferCache;
pub use crate::registry::{
    CredentialMapper, CredentialType, CredentialTypeDispatcher, CredentialTypeDispatcherBuilder,
    SubjectBinder,
};
pub use crate::signing::{DeferredCredentialWorkflow, SignedBatchReport};
pub use crate::storage::{EphemeralPurger, MemoryEphemeralStore, MemoryProcedureStore};
pub use crate::traits::{EphemeralStore, ProcedureStore};
pub use secrecy::{ExposeSecret, SecretString};

/// Commonly used types and traits
pub mod prelude {
    // Engine
    pub use crate::config::{EngineConfig, ExpirationConfig, ExpirationSchedule};
    pub use crate::engine::{IssuanceEngine, IssuanceEngineBuilder};
    pub use crate::expiration::{CredentialExpirationScheduler, SweepReport};
    pub use crate::signing::SignedBatchReport;

    // Core types
    pub use crate::core::{
        AuthContext, Clock, CreationRequest, CredentialId, CredentialProcedure, CredentialStatus,
        DeliveryMode, IssuanceError, OrganizationId, PendingCredential, ProcedureId, Result,
        SignatureFormat, SignedCredential, SigningMode, SystemClock,
    };
    pub use crate::grant::PreAuthorizationGrant;
    pub use secrecy::{ExposeSecret, SecretString};

    // Extension points
    pub use crate::registry::{
        CredentialMapper, CredentialType, CredentialTypeDispatcher, SubjectBinder,
    };
    pub use crate::traits::{EphemeralStore, ProcedureStore};
}
