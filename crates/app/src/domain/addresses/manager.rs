//! Address default manager.
//!
//! Every mutation of a user's address book runs under that user's lock and ends
//! by re-checking that the user has exactly one default address whenever they
//! have any.

use std::sync::Arc;

use jiff::Timestamp;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    domain::{
        addresses::{
            AddressesError,
            directory::AddressDirectory,
            models::{Address, AddressUpdate, AddressUuid, NewAddress},
        },
        audit::{AuditEvent, AuditEventKind, NotificationSink},
        postal::{
            PostalCodeResolver,
            models::{PostalCode, Resolution},
            resolver::local_region,
        },
        users::UserUuid,
    },
    locks::KeyedLocks,
    store::StoreError,
};

pub struct AddressDefaultManager {
    directory: Arc<dyn AddressDirectory>,
    resolver: PostalCodeResolver,
    sink: Arc<dyn NotificationSink>,
    locks: KeyedLocks<UserUuid>,
}

impl std::fmt::Debug for AddressDefaultManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressDefaultManager")
            .field("resolver", &self.resolver)
            .field("locked_users", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl AddressDefaultManager {
    #[must_use]
    pub fn new(
        directory: Arc<dyn AddressDirectory>,
        resolver: PostalCodeResolver,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            directory,
            resolver,
            sink,
            locks: KeyedLocks::new(),
        }
    }

    /// Addresses of a user, earliest created first.
    ///
    /// # Errors
    ///
    /// Returns [`AddressesError::Store`] when the directory fails.
    pub async fn list_addresses(&self, user: UserUuid) -> Result<Vec<Address>, AddressesError> {
        Ok(self.directory.list_by_user(user).await?)
    }

    /// Makes `address` the user's only default address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressesError::NotFound`] if the address does not exist or
    /// belongs to another user.
    #[tracing::instrument(
        name = "addresses.manager.set_default",
        skip(self),
        fields(user_uuid = %user, address_uuid = %address),
        err
    )]
    pub async fn set_default(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<Address, AddressesError> {
        let _guard = self.locks.lock(user).await;

        let mut target = self.owned(user, address).await?;

        if !target.is_default {
            self.directory.set_exclusive_default(user, address).await?;
            target.is_default = true;

            self.verify(user).await?;

            self.sink.record(AuditEvent::new(
                AuditEventKind::DefaultAddressChanged,
                address,
                json!({ "user_uuid": user.to_string() }),
            ));

            info!(user_uuid = %user, address_uuid = %address, "default address changed");
        }

        Ok(target)
    }

    /// Adds an address. The user's first address, or one created with
    /// `is_default`, becomes the only default.
    ///
    /// Blank street, neighborhood, city or region are filled in from the postal
    /// code. When the lookup is unavailable only the state can be inferred.
    ///
    /// # Errors
    ///
    /// - [`AddressesError::PostalCode`] for a malformed or unknown postal code.
    /// - [`AddressesError::IncompleteAddress`] when city or region stay blank.
    /// - [`AddressesError::RegionMismatch`] when the region contradicts the
    ///   postal code.
    #[tracing::instrument(
        name = "addresses.manager.create_address",
        skip(self, data),
        fields(user_uuid = %user),
        err
    )]
    pub async fn create_address(
        &self,
        user: UserUuid,
        data: NewAddress,
    ) -> Result<Address, AddressesError> {
        let data = self.complete(data).await?;

        let _guard = self.locks.lock(user).await;

        let existing = self.directory.list_by_user(user).await?;
        let make_default = existing.is_empty() || data.is_default;

        let mut created = self
            .directory
            .upsert(Address {
                uuid: AddressUuid::new(),
                user_uuid: user,
                label: data.label,
                street: data.street,
                number: data.number,
                complement: data.complement,
                neighborhood: data.neighborhood,
                city: data.city,
                region: data.region,
                postal_code: data.postal_code,
                is_default: false,
                created_at: Timestamp::now(),
            })
            .await?;

        if make_default {
            if let Err(error) = self.directory.set_exclusive_default(user, created.uuid).await {
                self.undo_create(created.uuid).await;

                return Err(error.into());
            }

            created.is_default = true;
        }

        self.verify(user).await?;

        self.sink.record(AuditEvent::new(
            AuditEventKind::AddressCreated,
            created.uuid,
            json!({
                "user_uuid": user.to_string(),
                "is_default": created.is_default,
            }),
        ));

        info!(
            user_uuid = %user,
            address_uuid = %created.uuid,
            is_default = created.is_default,
            "created address"
        );

        Ok(created)
    }

    /// Changes address fields and, optionally, the default flag.
    ///
    /// `is_default: Some(true)` behaves like [`Self::set_default`].
    /// `Some(false)` on the current default hands the flag to the earliest
    /// created other address; on a user's only address it changes nothing.
    ///
    /// # Errors
    ///
    /// - [`AddressesError::NotFound`] if the address does not exist or belongs
    ///   to another user.
    /// - [`AddressesError::PostalCode`] for a malformed postal code.
    /// - [`AddressesError::RegionMismatch`] when the region contradicts the
    ///   postal code.
    #[tracing::instrument(
        name = "addresses.manager.update_address",
        skip(self, update),
        fields(user_uuid = %user, address_uuid = %address),
        err
    )]
    pub async fn update_address(
        &self,
        user: UserUuid,
        address: AddressUuid,
        mut update: AddressUpdate,
    ) -> Result<Address, AddressesError> {
        update.postal_code = update
            .postal_code
            .map(|raw| PostalCode::parse(&raw).map(|code| code.as_str().to_string()))
            .transpose()?;

        let _guard = self.locks.lock(user).await;

        let original = self.owned(user, address).await?;
        let requested_default = update.is_default;
        let mut current = original.clone();

        if update.changes_fields() {
            update.apply_to(&mut current);
            check_region(&current.postal_code, &current.region)?;

            current = self.directory.upsert(current).await?;
        }

        let default_change = match (requested_default, original.is_default) {
            (Some(true), false) => Some(address),
            (Some(false), true) => self
                .directory
                .list_by_user(user)
                .await?
                .into_iter()
                .find(|other| other.uuid != address)
                .map(|other| other.uuid),
            _ => None,
        };

        if let Some(new_default) = default_change {
            if let Err(error) = self.directory.set_exclusive_default(user, new_default).await {
                self.restore(original).await;

                return Err(error.into());
            }

            current.is_default = new_default == address;
        }

        self.verify(user).await?;

        self.sink.record(AuditEvent::new(
            AuditEventKind::AddressUpdated,
            address,
            json!({
                "user_uuid": user.to_string(),
                "is_default": current.is_default,
                "default_changed": default_change.map(|uuid| uuid.to_string()),
            }),
        ));

        info!(user_uuid = %user, address_uuid = %address, "updated address");

        Ok(current)
    }

    /// Deletes an address. When it was the default, the earliest created
    /// remaining address becomes the default.
    ///
    /// Returns the promoted address, if any.
    ///
    /// # Errors
    ///
    /// - [`AddressesError::NotFound`] if the address does not exist or belongs
    ///   to another user.
    /// - [`AddressesError::InUse`] while any order references the address.
    #[tracing::instrument(
        name = "addresses.manager.delete_address",
        skip(self),
        fields(user_uuid = %user, address_uuid = %address),
        err
    )]
    pub async fn delete_address(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<Option<AddressUuid>, AddressesError> {
        let _guard = self.locks.lock(user).await;

        let deleted = self.owned(user, address).await?;

        self.directory
            .delete(address)
            .await
            .map_err(|error| match error {
                StoreError::InUse => AddressesError::InUse { address },
                other => AddressesError::from(other),
            })?;

        let mut promoted = None;

        if deleted.is_default {
            let remaining = self.directory.list_by_user(user).await?;

            if let Some(next) = remaining.first() {
                if let Err(error) = self.directory.set_exclusive_default(user, next.uuid).await {
                    self.restore(deleted).await;

                    return Err(error.into());
                }

                promoted = Some(next.uuid);
            }
        }

        self.verify(user).await?;

        self.sink.record(AuditEvent::new(
            AuditEventKind::AddressDeleted,
            address,
            json!({
                "user_uuid": user.to_string(),
                "promoted": promoted.map(|uuid| uuid.to_string()),
            }),
        ));

        info!(user_uuid = %user, address_uuid = %address, "deleted address");

        Ok(promoted)
    }

    /// Address owned by `user`; another user's address is reported as missing.
    async fn owned(&self, user: UserUuid, address: AddressUuid) -> Result<Address, AddressesError> {
        let found = self.directory.get(address).await?;

        if found.user_uuid != user {
            return Err(AddressesError::NotFound);
        }

        Ok(found)
    }

    /// Fills blank fields from the postal code and checks the result.
    async fn complete(&self, mut data: NewAddress) -> Result<NewAddress, AddressesError> {
        let postal_code = PostalCode::parse(&data.postal_code)?;
        data.postal_code = postal_code.as_str().to_string();

        let blanks = [&data.street, &data.neighborhood, &data.city, &data.region]
            .iter()
            .any(|field| field.trim().is_empty());

        if blanks {
            match self.resolver.resolve(postal_code.as_str()).await? {
                Resolution::Resolved(resolved) => {
                    fill(&mut data.street, resolved.street);
                    fill(&mut data.neighborhood, resolved.neighborhood);
                    fill(&mut data.city, resolved.city);
                    fill(&mut data.region, resolved.region);
                }
                Resolution::Degraded { region, .. } => {
                    if let Some(region) = region {
                        fill(&mut data.region, region.to_string());
                    }
                }
            }
        }

        if data.city.trim().is_empty() {
            return Err(AddressesError::IncompleteAddress { field: "city" });
        }

        if data.region.trim().is_empty() {
            return Err(AddressesError::IncompleteAddress { field: "region" });
        }

        check_region(&data.postal_code, &data.region)?;

        Ok(data)
    }

    /// Re-checks the single-default invariant for a user.
    async fn verify(&self, user: UserUuid) -> Result<(), AddressesError> {
        let addresses = self.directory.list_by_user(user).await?;
        let defaults = addresses.iter().filter(|address| address.is_default).count();

        if defaults != addresses.len().min(1) {
            error!(
                user_uuid = %user,
                defaults,
                addresses = addresses.len(),
                "default address invariant violated"
            );

            return Err(AddressesError::InvariantViolation {
                user,
                defaults,
                addresses: addresses.len(),
            });
        }

        Ok(())
    }

    async fn undo_create(&self, address: AddressUuid) {
        if let Err(error) = self.directory.delete(address).await {
            warn!(address_uuid = %address, %error, "failed to remove half-created address");
        }
    }

    async fn restore(&self, address: Address) {
        let uuid = address.uuid;

        if let Err(error) = self.directory.upsert(address).await {
            warn!(address_uuid = %uuid, %error, "failed to restore address");
        }
    }
}

fn fill(field: &mut String, resolved: String) {
    if field.trim().is_empty() {
        *field = resolved;
    }
}

fn check_region(postal_code: &str, region: &str) -> Result<(), AddressesError> {
    let Ok(code) = PostalCode::parse(postal_code) else {
        return Ok(());
    };

    match local_region(&code) {
        Some(expected) if !expected.eq_ignore_ascii_case(region.trim()) => {
            Err(AddressesError::RegionMismatch {
                postal_code: code.to_string(),
                expected,
                given: region.to_string(),
            })
        }
        _ => Ok(()),
    }
}
