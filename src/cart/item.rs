use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::purchase_mode::{
    ProductSignals, PurchaseMode, coerce_stock, max_allowed_quantity, resolve_purchase_mode,
};

/// A normalized cart line, serialized in the storefront client's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub price: i64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub purchase_mode: PurchaseMode,
    pub max_quantity: i64,
}

impl CartItem {
    /// Saturates instead of overflowing on tampered stored prices.
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(self.quantity)
    }
}

/// Add-to-cart request. Every purchase-rule field is optional; whatever is
/// missing is derived from the product hints or from the request itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCartItem {
    pub id: String,
    pub name: String,
    pub variant: Option<String>,
    pub price: i64,
    pub image: Option<String>,
    pub quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub purchase_mode: Option<PurchaseMode>,
    pub stock: Option<i64>,
    pub is_single_unit: Option<bool>,
    pub category: Option<String>,
}

impl NewCartItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            ..Default::default()
        }
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn max_quantity(mut self, max_quantity: i64) -> Self {
        self.max_quantity = Some(max_quantity);
        self
    }

    pub fn mode(mut self, mode: PurchaseMode) -> Self {
        self.purchase_mode = Some(mode);
        self
    }

    pub fn stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    pub(crate) fn requested_quantity(&self) -> i64 {
        self.quantity.unwrap_or(1).max(1)
    }

    fn resolved_mode(&self) -> PurchaseMode {
        self.purchase_mode.unwrap_or_else(|| {
            resolve_purchase_mode(&ProductSignals {
                is_single_unit: self.is_single_unit,
                category_slug: self.category.as_deref(),
                ..Default::default()
            })
        })
    }

    /// Applies the purchase rules. `None` means nothing may be added.
    pub(crate) fn normalize(self) -> Option<CartItem> {
        let mode = self.resolved_mode();
        let requested = self.requested_quantity();

        let max_quantity = match (self.max_quantity, self.stock) {
            (Some(max), _) => max,
            (None, Some(stock)) => max_allowed_quantity(mode, stock),
            (None, None) => requested,
        };
        let max_quantity = if mode.is_single_unit() {
            max_quantity.min(1)
        } else {
            max_quantity
        };
        if max_quantity < 1 {
            return None;
        }

        let quantity = if mode.is_single_unit() {
            1
        } else {
            requested.clamp(1, max_quantity)
        };

        Some(CartItem {
            id: self.id,
            name: self.name,
            variant: self.variant,
            price: self.price,
            quantity,
            image: self.image,
            purchase_mode: mode,
            max_quantity,
        })
    }

    /// Reads one persisted record, tolerating older client shapes. Records
    /// without an id or a name are rejected.
    pub(crate) fn from_stored(record: &Value) -> Option<Self> {
        let id = match record.get("id")? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = text(record, "name")?;

        let category = text(record, "category").or_else(|| {
            let linked = record.get("category")?;
            text(linked, "slug").or_else(|| text(linked, "name"))
        });

        Some(Self {
            id,
            name,
            variant: text(record, "variant"),
            price: number(record, "price").map_or(0, |p| p.round().max(0.0) as i64),
            image: text(record, "image"),
            quantity: number(record, "quantity").map(|q| q.floor() as i64),
            max_quantity: number(record, "maxQuantity").map(|m| m.floor() as i64),
            purchase_mode: record
                .get("purchaseMode")
                .and_then(Value::as_str)
                .and_then(PurchaseMode::parse),
            stock: number(record, "stock").map(coerce_stock),
            is_single_unit: record.get("isSingleUnit").and_then(Value::as_bool),
            category,
        })
    }
}

impl From<CartItem> for NewCartItem {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            variant: item.variant,
            price: item.price,
            image: item.image,
            quantity: Some(item.quantity),
            max_quantity: Some(item.max_quantity),
            purchase_mode: Some(item.purchase_mode),
            stock: None,
            is_single_unit: None,
            category: None,
        }
    }
}

fn text(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(record: &Value, key: &str) -> Option<f64> {
    let value = match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}
