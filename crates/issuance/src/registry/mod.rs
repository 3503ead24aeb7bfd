//! Credential type dispatch to externally supplied mappers

mod dispatcher;

pub use dispatcher::{
    CredentialMapper, CredentialType, CredentialTypeDispatcher, CredentialTypeDispatcherBuilder,
    SubjectBinder,
};
