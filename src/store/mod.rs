//! Narrow persistence ports used by checkout and the saved-address book,
//! and their Postgres adapter.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        CheckoutAddress, Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod,
        PaymentStatus,
    },
    purchase_mode::{CategoryHint, ProductSignals},
};

mod postgres;

pub use postgres::PgStore;
pub(crate) use postgres::{
    category_from_entity, load_items, order_from_entity, product_from_entity,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("{0}")]
    Backend(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryInfo {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

/// Authoritative product data consulted at order time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub title: String,
    pub sku: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub purchase_mode: Option<String>,
    pub is_single_unit: Option<bool>,
    pub category_slug: Option<String>,
    pub category: Option<CategoryInfo>,
}

impl CatalogProduct {
    pub fn signals(&self) -> ProductSignals<'_> {
        ProductSignals {
            purchase_mode: self.purchase_mode.as_deref(),
            is_single_unit: self.is_single_unit,
            category_slug: self.category_slug.as_deref(),
            category: self.category.as_ref().map(|c| CategoryHint {
                slug: c.slug.as_deref(),
                name: c.name.as_deref(),
                display_name: c.display_name.as_deref(),
            }),
        }
    }
}

/// Stock levels around a floored decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    pub previous: i32,
    pub remaining: i32,
}

impl StockDecrement {
    /// Units ordered beyond what was on hand at decrement time.
    pub fn shortfall(&self, ordered: i32) -> i32 {
        (ordered - self.previous).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
    pub shipping_address: CheckoutAddress,
    pub billing_address: CheckoutAddress,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_title: String,
    pub product_sku: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// One batch lookup; ids with no product are simply absent.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogProduct>, StoreError>;

    /// Atomically lowers stock by `quantity`, never below zero. `None` when
    /// the product no longer exists.
    async fn decrement_stock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockDecrement>, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, StoreError>;

    async fn insert_items(&self, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, StoreError>;

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError>;

    /// Newest first, with the caller's total order count.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Order>, u64), StoreError>;

    async fn find_by_number(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<Option<OrderWithItems>, StoreError>;
}

/// A user's saved addresses as loosely-shaped JSON records.
#[async_trait]
pub trait AddressStore: Send + Sync {
    async fn load_addresses(&self, user_id: Uuid) -> Result<Vec<Value>, StoreError>;

    /// Replaces the whole list, keyed by the account email.
    async fn save_addresses(
        &self,
        user_id: Uuid,
        email: &str,
        addresses: Vec<Value>,
    ) -> Result<(), StoreError>;
}
