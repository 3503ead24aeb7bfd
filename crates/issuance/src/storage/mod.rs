//! In-memory storage backends and their housekeeping

mod ephemeral;
mod memory;
mod purge;

pub use ephemeral::MemoryEphemeralStore;
pub use memory::MemoryProcedureStore;
pub use purge::EphemeralPurger;
