//! Address Models

use jiff::Timestamp;

use crate::{domain::users::UserUuid, uuids::TypedUuid};

/// Address UUID
pub type AddressUuid = TypedUuid<Address>;

/// Address Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub uuid: AddressUuid,
    pub user_uuid: UserUuid,
    pub label: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub is_default: bool,
    pub created_at: Timestamp,
}

/// New Address Model
///
/// Street, neighborhood, city and region may be left blank when the postal
/// code is enough to resolve them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAddress {
    pub label: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub is_default: bool,
}

/// Address Update Model
///
/// `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressUpdate {
    pub label: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<Option<String>>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressUpdate {
    /// Whether any field other than the default flag changes.
    #[must_use]
    pub fn changes_fields(&self) -> bool {
        self.label.is_some()
            || self.street.is_some()
            || self.number.is_some()
            || self.complement.is_some()
            || self.neighborhood.is_some()
            || self.city.is_some()
            || self.region.is_some()
            || self.postal_code.is_some()
    }

    pub(crate) fn apply_to(self, address: &mut Address) {
        if let Some(label) = self.label {
            address.label = label;
        }
        if let Some(street) = self.street {
            address.street = street;
        }
        if let Some(number) = self.number {
            address.number = number;
        }
        if let Some(complement) = self.complement {
            address.complement = complement;
        }
        if let Some(neighborhood) = self.neighborhood {
            address.neighborhood = neighborhood;
        }
        if let Some(city) = self.city {
            address.city = city;
        }
        if let Some(region) = self.region {
            address.region = region;
        }
        if let Some(postal_code) = self.postal_code {
            address.postal_code = postal_code;
        }
    }
}
