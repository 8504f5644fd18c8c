//! Order, stock, address and payment consistency engine for the bakery shop.

pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod locks;
pub mod observability;
pub mod store;
pub mod uuids;

#[cfg(test)]
mod test;
