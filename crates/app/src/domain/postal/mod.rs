//! Postal-code lookup
//!
//! Resolves Brazilian postal codes (CEP) to street, neighborhood, city and
//! state. The remote lookup is a single attempt under a timeout; when it is
//! unavailable the resolver degrades to a local CEP-range table.

mod errors;
pub mod lookup;
pub mod models;
pub mod resolver;

pub use errors::PostalLookupError;
pub use lookup::*;
pub use resolver::PostalCodeResolver;
