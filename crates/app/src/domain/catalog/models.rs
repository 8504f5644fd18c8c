//! Catalog Models

use rust_decimal::Decimal;

use crate::uuids::TypedUuid;

/// Product UUID
pub type ProductUuid = TypedUuid<Product>;

/// Product Model
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub uuid: ProductUuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    pub weight_kg: Decimal,
}

/// New Product Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    pub weight_kg: Decimal,
}
