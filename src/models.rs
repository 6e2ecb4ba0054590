use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::purchase_mode::PurchaseMode;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub purchase_mode: Option<String>,
    pub is_single_unit: Option<bool>,
    pub category_id: Option<Uuid>,
    pub category_slug: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product as the storefront shows it: the record plus the purchase rule
/// and quantity cap derived from it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub effective_purchase_mode: PurchaseMode,
    pub max_quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward one step along pending→processing→shipped→delivered, or
    /// cancel from any non-terminal status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (from, Cancelled) => !from.is_terminal(),
            (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered) => true,
            _ => false,
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Accepted payment method labels. No gateway is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Online => "online",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(PaymentMethod::Cod),
            "online" => Ok(PaymentMethod::Online),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Phone number must have at least 10 digits")]
    PhoneTooShort,

    #[error("Pincode must be exactly 6 digits")]
    InvalidPincode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CheckoutAddress {
    #[serde(alias = "fullName")]
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl CheckoutAddress {
    fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("Full name", self.full_name.as_str()),
            ("Phone number", self.phone.as_str()),
            ("Address", self.address.as_str()),
            ("City", self.city.as_str()),
            ("State", self.state.as_str()),
            ("Pincode", self.pincode.as_str()),
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, value)| !value.trim().is_empty())
    }

    pub fn has_any_field(&self) -> bool {
        self.fields().iter().any(|(_, value)| !value.trim().is_empty())
    }

    /// Reports the first violation only.
    pub fn validate(&self) -> Result<(), AddressError> {
        if let Some((label, _)) = self.fields().iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AddressError::Missing(*label));
        }
        if digit_count(&self.phone) < 10 {
            return Err(AddressError::PhoneTooShort);
        }
        if digit_count(&self.pincode) != 6 {
            return Err(AddressError::InvalidPincode);
        }
        Ok(())
    }

    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            pincode: self.pincode.trim().to_string(),
        }
    }
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(char::is_ascii_digit).count()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_title: String,
    pub product_sku: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub subtotal: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Requested quantity that the catalog cannot cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StockViolation {
    pub product_id: String,
    pub name: String,
    pub requested: i64,
    pub available: i64,
}

impl fmt::Display for StockViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (requested {}, available {})",
            self.name, self.product_id, self.requested, self.available
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> CheckoutAddress {
        CheckoutAddress {
            full_name: "Asha Rao".into(),
            phone: "+91 98450 12345".into(),
            address: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            pincode: "560001".into(),
        }
    }

    #[test]
    fn complete_address_validates() {
        assert_eq!(address().validate(), Ok(()));
    }

    #[test]
    fn first_missing_field_is_reported() {
        let mut addr = address();
        addr.city = " ".into();
        addr.pincode.clear();
        assert_eq!(addr.validate(), Err(AddressError::Missing("City")));
        assert_eq!(addr.validate().unwrap_err().to_string(), "City is required");
    }

    #[test]
    fn phone_and_pincode_digits_are_counted() {
        let mut addr = address();
        addr.phone = "98-450-12".into();
        assert_eq!(addr.validate(), Err(AddressError::PhoneTooShort));

        let mut addr = address();
        addr.pincode = "5600011".into();
        assert_eq!(addr.validate(), Err(AddressError::InvalidPincode));
    }

    #[test]
    fn product_view_exposes_raw_and_resolved_mode() {
        let view = ProductView {
            product: Product {
                id: Uuid::nil(),
                title: "Silicone Case".into(),
                description: None,
                sku: None,
                price: 499,
                stock: 12,
                purchase_mode: None,
                is_single_unit: None,
                category_id: None,
                category_slug: Some("accessories".into()),
                image_url: None,
                created_at: Utc::now(),
            },
            effective_purchase_mode: PurchaseMode::MultiUnit,
            max_quantity: 12,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["purchase_mode"], serde_json::Value::Null);
        assert_eq!(json["effective_purchase_mode"], "multi_unit");
        assert_eq!(json["max_quantity"], 12);
        assert_eq!(json["title"], "Silicone Case");
    }

    #[test]
    fn stock_violation_names_title_and_id() {
        let violation = StockViolation {
            product_id: "prod1".into(),
            name: "Pixel 7".into(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            violation.to_string(),
            "Pixel 7 [prod1] (requested 5, available 3)"
        );
    }

    #[test]
    fn status_lifecycle() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }
}
