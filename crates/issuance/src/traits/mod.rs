//! Storage contracts the engine is written against

mod store;

pub use store::{EphemeralStore, ProcedureStore};
