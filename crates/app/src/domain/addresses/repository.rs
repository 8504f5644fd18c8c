//! Addresses Repository

use async_trait::async_trait;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, postgres::PgRow, query, query_as};

use crate::{
    database::Db,
    domain::{
        addresses::{
            directory::AddressDirectory,
            models::{Address, AddressUuid},
        },
        users::UserUuid,
    },
    store::StoreError,
};

const LIST_ADDRESSES_BY_USER_SQL: &str = include_str!("sql/list_addresses_by_user.sql");
const GET_ADDRESS_SQL: &str = include_str!("sql/get_address.sql");
const UPSERT_ADDRESS_SQL: &str = include_str!("sql/upsert_address.sql");
const DELETE_ADDRESS_SQL: &str = include_str!("sql/delete_address.sql");
const CLEAR_OTHER_DEFAULTS_SQL: &str = include_str!("sql/clear_other_defaults.sql");
const SET_DEFAULT_SQL: &str = include_str!("sql/set_default.sql");

#[derive(Debug, Clone)]
pub struct PgAddressDirectory {
    db: Db,
}

impl PgAddressDirectory {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressDirectory for PgAddressDirectory {
    async fn list_by_user(&self, user: UserUuid) -> Result<Vec<Address>, StoreError> {
        let addresses = query_as::<Postgres, Address>(LIST_ADDRESSES_BY_USER_SQL)
            .bind(user.into_uuid())
            .fetch_all(self.db.pool())
            .await?;

        Ok(addresses)
    }

    async fn get(&self, address: AddressUuid) -> Result<Address, StoreError> {
        let address = query_as::<Postgres, Address>(GET_ADDRESS_SQL)
            .bind(address.into_uuid())
            .fetch_one(self.db.pool())
            .await?;

        Ok(address)
    }

    async fn upsert(&self, address: Address) -> Result<Address, StoreError> {
        // A conflicting UUID owned by another user updates nothing and returns
        // no row, which surfaces as NotFound.
        let stored = query_as::<Postgres, Address>(UPSERT_ADDRESS_SQL)
            .bind(address.uuid.into_uuid())
            .bind(address.user_uuid.into_uuid())
            .bind(address.label)
            .bind(address.street)
            .bind(address.number)
            .bind(address.complement)
            .bind(address.neighborhood)
            .bind(address.city)
            .bind(address.region)
            .bind(address.postal_code)
            .bind(address.is_default)
            .bind(SqlxTimestamp::from(address.created_at))
            .fetch_one(self.db.pool())
            .await?;

        Ok(stored)
    }

    async fn delete(&self, address: AddressUuid) -> Result<(), StoreError> {
        let rows_affected = query(DELETE_ADDRESS_SQL)
            .bind(address.into_uuid())
            .execute(self.db.pool())
            .await
            .map_err(|error| match StoreError::from(error) {
                StoreError::InvalidReference => StoreError::InUse,
                other => other,
            })?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn set_exclusive_default(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        query(CLEAR_OTHER_DEFAULTS_SQL)
            .bind(user.into_uuid())
            .bind(address.into_uuid())
            .execute(&mut *tx)
            .await?;

        let rows_affected = query(SET_DEFAULT_SQL)
            .bind(user.into_uuid())
            .bind(address.into_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }
}

impl<'r> FromRow<'r, PgRow> for Address {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: AddressUuid::from_uuid(row.try_get("uuid")?),
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            label: row.try_get("label")?,
            street: row.try_get("street")?,
            number: row.try_get("number")?,
            complement: row.try_get("complement")?,
            neighborhood: row.try_get("neighborhood")?,
            city: row.try_get("city")?,
            region: row.try_get("region")?,
            postal_code: row.try_get("postal_code")?,
            is_default: row.try_get("is_default")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
