#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use refurb_storefront::{
    dto::orders::{CheckoutItemInput, CheckoutRequest},
    middleware::auth::AuthUser,
    models::{CheckoutAddress, Order, OrderItem, OrderWithItems},
    pricing::PricingPolicy,
    services::{address_service::AddressBook, order_service::OrderService},
    store::{
        AddressStore, CatalogProduct, CategoryInfo, NewOrder, NewOrderItem, OrderStore,
        ProductCatalog, StockDecrement, StoreError,
    },
};
use serde_json::Value;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeCatalog {
    products: Mutex<HashMap<Uuid, CatalogProduct>>,
    pub fail_decrement: AtomicBool,
    pub decrements: Mutex<Vec<(Uuid, i32)>>,
    // units another checkout takes right before our decrement runs
    sold_elsewhere: Mutex<HashMap<Uuid, i32>>,
}

impl FakeCatalog {
    pub fn with(products: Vec<CatalogProduct>) -> Self {
        let catalog = Self::default();
        {
            let mut map = catalog.products.lock().unwrap();
            for p in products {
                map.insert(p.id, p);
            }
        }
        catalog
    }

    pub fn stock_of(&self, id: Uuid) -> Option<i32> {
        self.products.lock().unwrap().get(&id).map(|p| p.stock)
    }

    pub fn sell_elsewhere(&self, id: Uuid, units: i32) {
        self.sold_elsewhere.lock().unwrap().insert(id, units);
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogProduct>, StoreError> {
        let map = self.products.lock().unwrap();
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn decrement_stock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockDecrement>, StoreError> {
        if self.fail_decrement.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("stock update timed out".into()));
        }
        self.decrements.lock().unwrap().push((id, quantity));

        let mut map = self.products.lock().unwrap();
        let Some(product) = map.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(units) = self.sold_elsewhere.lock().unwrap().remove(&id) {
            product.stock = (product.stock - units).max(0);
        }
        let previous = product.stock;
        product.stock = (product.stock - quantity).max(0);
        Ok(Some(StockDecrement {
            previous,
            remaining: product.stock,
        }))
    }
}

#[derive(Default)]
pub struct FakeOrders {
    pub orders: Mutex<Vec<Order>>,
    pub items: Mutex<Vec<OrderItem>>,
    pub fail_items: AtomicBool,
    pub fail_delete: AtomicBool,
    pub collisions_left: AtomicUsize,
    pub insert_attempts: AtomicUsize,
}

impl FakeOrders {
    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderStore for FakeOrders {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .collisions_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Duplicate("orders_order_number_key".into()));
        }

        let now = Utc::now();
        let stored = Order {
            id: order.id,
            user_id: order.user_id,
            order_number: order.order_number.clone(),
            status: order.status,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            subtotal: order.subtotal,
            shipping: order.shipping,
            tax: order.tax,
            total: order.total,
            shipping_address: order.shipping_address.clone(),
            billing_address: order.billing_address.clone(),
            created_at: now,
            updated_at: now,
        };
        self.orders.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn insert_items(&self, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, StoreError> {
        if self.fail_items.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("order_items insert rejected".into()));
        }
        let rows: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: item.order_id,
                product_id: item.product_id,
                product_title: item.product_title.clone(),
                product_sku: item.product_sku.clone(),
                price: item.price,
                quantity: item.quantity,
                subtotal: item.subtotal,
                created_at: Utc::now(),
            })
            .collect();
        self.items.lock().unwrap().extend(rows.clone());
        Ok(rows)
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.orders.lock().unwrap().retain(|o| o.id != id);
        self.items.lock().unwrap().retain(|i| i.order_id != id);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let mine: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        let total = mine.len() as u64;
        Ok((
            mine.into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
            total,
        ))
    }

    async fn find_by_number(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<Option<OrderWithItems>, StoreError> {
        let order = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.user_id == user_id && o.order_number == order_number)
            .cloned();
        Ok(order.map(|order| {
            let items = self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.order_id == order.id)
                .cloned()
                .collect();
            OrderWithItems { order, items }
        }))
    }
}

#[derive(Default)]
pub struct FakeAddresses {
    pub lists: Mutex<HashMap<Uuid, (String, Vec<Value>)>>,
}

impl FakeAddresses {
    pub fn seed(&self, user_id: Uuid, email: &str, list: Vec<Value>) {
        self.lists
            .lock()
            .unwrap()
            .insert(user_id, (email.to_string(), list));
    }

    pub fn list_for(&self, user_id: Uuid) -> Vec<Value> {
        self.lists
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|(_, list)| list.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AddressStore for FakeAddresses {
    async fn load_addresses(&self, user_id: Uuid) -> Result<Vec<Value>, StoreError> {
        Ok(self.list_for(user_id))
    }

    async fn save_addresses(
        &self,
        user_id: Uuid,
        email: &str,
        addresses: Vec<Value>,
    ) -> Result<(), StoreError> {
        self.seed(user_id, email, addresses);
        Ok(())
    }
}

pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub orders: Arc<FakeOrders>,
    pub addresses: Arc<FakeAddresses>,
    pub service: OrderService,
}

impl Harness {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        let addresses = Arc::new(FakeAddresses::default());
        Self::build(products, addresses.clone(), addresses)
    }

    pub fn with_address_store(products: Vec<CatalogProduct>, store: Arc<dyn AddressStore>) -> Self {
        Self::build(products, Arc::new(FakeAddresses::default()), store)
    }

    fn build(
        products: Vec<CatalogProduct>,
        addresses: Arc<FakeAddresses>,
        store: Arc<dyn AddressStore>,
    ) -> Self {
        let catalog = Arc::new(FakeCatalog::with(products));
        let orders = Arc::new(FakeOrders::default());
        let service = OrderService::new(
            catalog.clone(),
            orders.clone(),
            AddressBook::new(store),
            PricingPolicy::default(),
        );
        Self {
            catalog,
            orders,
            addresses,
            service,
        }
    }
}

pub fn product(title: &str, price: i64, stock: i32) -> CatalogProduct {
    CatalogProduct {
        id: Uuid::new_v4(),
        title: title.to_string(),
        sku: Some(format!("SKU-{}", title.to_uppercase())),
        price,
        stock,
        purchase_mode: None,
        is_single_unit: None,
        category_slug: None,
        category: None,
    }
}

pub fn single_unit(title: &str, price: i64, stock: i32) -> CatalogProduct {
    CatalogProduct {
        purchase_mode: Some("single_unit".into()),
        ..product(title, price, stock)
    }
}

pub fn accessory(title: &str, price: i64, stock: i32) -> CatalogProduct {
    CatalogProduct {
        category: Some(CategoryInfo {
            slug: Some("accessories".into()),
            name: Some("Accessories".into()),
            display_name: None,
        }),
        ..product(title, price, stock)
    }
}

pub fn customer() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        email: Some("asha@example.com".into()),
        role: "user".into(),
    }
}

pub fn address() -> CheckoutAddress {
    CheckoutAddress {
        full_name: "Asha Rao".into(),
        phone: "+91 98450 12345".into(),
        address: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        pincode: "560001".into(),
    }
}

pub fn line(product: &CatalogProduct, quantity: f64) -> CheckoutItemInput {
    CheckoutItemInput::new(product.id.to_string(), quantity, product.price as f64)
        .named(product.title.clone())
}

pub fn request(items: Vec<CheckoutItemInput>) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: Some(address()),
        billing_address: None,
        payment_method: Some("cod".into()),
        items,
    }
}
