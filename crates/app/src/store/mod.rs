//! Persistence backends shared by the domain stores.

mod errors;
pub mod memory;

pub use errors::StoreError;
pub use memory::MemoryStore;
