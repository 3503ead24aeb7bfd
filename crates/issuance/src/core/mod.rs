//! Core types for credential issuance

mod clock;
mod error;
mod id;
mod procedure;
mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, IssuanceError, Result, StoreError, StoreResult};
pub use id::{CredentialId, OrganizationId, ProcedureId};
pub use procedure::{
    AuthContext, CreationRequest, CredentialProcedure, DeliveryMode, PendingCredential,
    SignatureFormat, SignedCredential, SigningMode,
};
pub use status::CredentialStatus;
