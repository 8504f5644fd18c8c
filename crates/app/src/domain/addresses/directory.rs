//! Address directory.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    domain::{
        addresses::models::{Address, AddressUuid},
        users::UserUuid,
    },
    store::StoreError,
};

#[automock]
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    /// Addresses of a user, earliest created first.
    async fn list_by_user(&self, user: UserUuid) -> Result<Vec<Address>, StoreError>;

    /// Retrieve a single address.
    async fn get(&self, address: AddressUuid) -> Result<Address, StoreError>;

    /// Inserts or replaces an address by UUID.
    async fn upsert(&self, address: Address) -> Result<Address, StoreError>;

    /// Deletes an address. Fails with [`StoreError::InUse`] while orders
    /// reference it.
    async fn delete(&self, address: AddressUuid) -> Result<(), StoreError>;

    /// Makes `address` the only default among the user's addresses, in one
    /// write.
    async fn set_exclusive_default(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<(), StoreError>;
}
