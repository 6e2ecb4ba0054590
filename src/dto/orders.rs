use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CheckoutAddress, Order, OrderStatus, OrderWithItems};

/// One cart line as submitted by the storefront. Every field is optional so
/// that malformed lines reach validation and get a descriptive error.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct CheckoutItemInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
}

impl CheckoutItemInput {
    pub fn new(id: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            quantity: Some(quantity),
            price: Some(price),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct CheckoutRequest {
    #[serde(alias = "shippingAddress")]
    pub shipping_address: Option<CheckoutAddress>,
    #[serde(alias = "billingAddress")]
    pub billing_address: Option<CheckoutAddress>,
    #[serde(alias = "paymentMethod")]
    pub payment_method: Option<String>,
    pub items: Vec<CheckoutItemInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlacedOrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceOrderResponse {
    pub order: PlacedOrderSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// `GET /orders` answers with the history page, or with one order when an
/// order number is given.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum OrdersPayload {
    List(OrderList),
    Single(OrderWithItems),
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}
