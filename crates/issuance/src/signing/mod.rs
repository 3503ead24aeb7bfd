//! Signed-artifact intake
//!
//! - [`artifact`]: structural checks on signer output
//! - [`deferred`]: PEND_SIGNATURE batching and signer callbacks

pub mod artifact;
pub mod deferred;

pub use deferred::{DeferredCredentialWorkflow, SignedBatchReport};
