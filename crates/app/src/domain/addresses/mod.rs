//! Addresses
//!
//! Address book per user with exactly one default address whenever the user has
//! any. [`AddressDefaultManager`] is the only writer of the default flag.

pub mod directory;
mod errors;
pub mod manager;
pub mod models;
mod repository;

pub use directory::*;
pub use errors::AddressesError;
pub use manager::AddressDefaultManager;
pub use repository::PgAddressDirectory;
