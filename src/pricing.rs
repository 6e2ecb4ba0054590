use serde::Serialize;
use utoipa::ToSchema;

/// Shipping and tax policy applied to every order. Amounts are whole
/// currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub free_shipping_threshold: i64,
    pub flat_shipping_fee: i64,
    pub tax_rate_percent: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 50_000,
            flat_shipping_fee: 200,
            tax_rate_percent: 18,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
}

impl PricingPolicy {
    pub fn shipping_for(&self, subtotal: i64) -> i64 {
        if subtotal >= self.free_shipping_threshold {
            0
        } else {
            self.flat_shipping_fee
        }
    }

    /// Tax rounded half up to the nearest whole unit.
    pub fn tax_for(&self, subtotal: i64) -> i64 {
        let scaled = subtotal.max(0) * self.tax_rate_percent;
        (scaled + 50) / 100
    }

    pub fn quote(&self, subtotal: i64) -> OrderTotals {
        let shipping = self.shipping_for(subtotal);
        let tax = self.tax_for(subtotal);
        OrderTotals {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}
