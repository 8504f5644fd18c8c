//! Users
//!
//! Users are owned by the identity layer; the engine only needs to scope
//! addresses and orders by them.

use crate::uuids::TypedUuid;

/// User marker.
#[derive(Debug)]
pub struct User;

/// User UUID
pub type UserUuid = TypedUuid<User>;
