use serde_json::Value;

use super::{CartItem, CartStorage, NewCartItem};

/// Storage key holding the JSON array of cart items.
pub const CART_STORAGE_KEY: &str = "refurb-cart";

/// Cart state for one storefront session.
///
/// Invariants held after every operation:
/// - every line satisfies `1 <= quantity <= max_quantity`;
/// - single-unit lines have quantity and cap of exactly 1;
/// - at most one single-unit line exists.
///
/// The full collection is written back to storage after each mutation.
pub struct CartStore<S> {
    storage: S,
    items: Vec<CartItem>,
    is_open: bool,
}

impl<S: CartStorage> CartStore<S> {
    /// Rehydrates the cart, renormalizing every stored record. The cleaned
    /// collection is written back only when the read itself succeeded; after
    /// a failed read the stored cart is left untouched until the next
    /// mutation.
    pub fn load(storage: S) -> Self {
        let (items, read_ok) = match storage.read(CART_STORAGE_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<Value>>(&bytes) {
                Ok(records) => (renormalize(&records), true),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable stored cart");
                    (Vec::new(), true)
                }
            },
            Ok(None) => (Vec::new(), true),
            Err(err) => {
                tracing::warn!(error = %err, "cart storage read failed");
                (Vec::new(), false)
            }
        };

        let store = Self {
            storage,
            items,
            is_open: false,
        };
        if read_ok {
            store.persist();
        }
        store
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item_count(&self) -> i64 {
        self.items
            .iter()
            .fold(0i64, |count, item| count.saturating_add(item.quantity))
    }

    pub fn subtotal(&self) -> i64 {
        self.items
            .iter()
            .fold(0i64, |total, item| total.saturating_add(item.line_total()))
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn set_open(&mut self, open: bool) {
        self.is_open = open;
    }

    /// Adds or merges a line. Out-of-stock requests are ignored. A
    /// single-unit product replaces any other single-unit line; the latest
    /// add supplies the display fields of a merged line.
    pub fn add_item(&mut self, line: NewCartItem) {
        let requested = line.requested_quantity();
        let Some(incoming) = line.normalize() else {
            tracing::debug!("add to cart ignored: nothing available");
            return;
        };

        if incoming.purchase_mode.is_single_unit() {
            self.items
                .retain(|item| !item.purchase_mode.is_single_unit() || item.id == incoming.id);
        }

        match self.items.iter_mut().find(|item| item.id == incoming.id) {
            Some(existing) => {
                let max_quantity = existing.max_quantity.max(incoming.max_quantity);
                let quantity = (existing.quantity + requested).min(max_quantity);
                *existing = CartItem {
                    quantity,
                    max_quantity,
                    ..incoming
                };
                if existing.purchase_mode.is_single_unit() {
                    existing.quantity = 1;
                    existing.max_quantity = 1;
                }
            }
            None => self.items.push(incoming),
        }

        self.is_open = true;
        self.persist();
    }

    pub fn remove_item(&mut self, id: &str) {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Sets a line's quantity within its cap. Anything below 1 removes it.
    pub fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity < 1 {
            self.remove_item(id);
            return;
        }
        let Some(pos) = self.items.iter().position(|item| item.id == id) else {
            return;
        };

        let mut line = NewCartItem::from(self.items.remove(pos));
        line.quantity = Some(quantity);
        if let Some(item) = line.normalize() {
            self.items.insert(pos, item);
        }
        self.persist();
    }

    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.persist();
    }

    fn persist(&self) {
        let result = serde_json::to_vec(&self.items)
            .map_err(|err| err.to_string())
            .and_then(|bytes| {
                self.storage
                    .write(CART_STORAGE_KEY, &bytes)
                    .map_err(|err| err.to_string())
            });
        if let Err(err) = result {
            tracing::warn!(error = %err, "cart persist failed");
        }
    }
}

/// Renormalizes stored records: unusable records are dropped, repeated ids
/// keep their first occurrence and only the last single-unit line survives.
pub fn renormalize(records: &[Value]) -> Vec<CartItem> {
    let mut items: Vec<CartItem> = Vec::new();
    for record in records {
        let Some(item) = NewCartItem::from_stored(record).and_then(NewCartItem::normalize) else {
            continue;
        };
        if items.iter().any(|existing| existing.id == item.id) {
            continue;
        }
        if item.purchase_mode.is_single_unit() {
            items.retain(|existing| !existing.purchase_mode.is_single_unit());
        }
        items.push(item);
    }
    items
}
