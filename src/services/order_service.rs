//! Order placement and the customer's order history.
//!
//! [`OrderService::place_order`] is the authoritative checkout: it re-checks
//! the submitted cart against catalog data, prices it, writes the order and
//! its lines (deleting the order again if the lines cannot be written) and
//! then runs the post-commit follow-ups. Follow-ups never fail the order;
//! their failures are logged and returned in [`CheckoutOutcome`].

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record_audit},
    dto::orders::{
        CheckoutItemInput, CheckoutRequest, OrderList, OrdersPayload, PlaceOrderResponse,
        PlacedOrderSummary,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{
        CheckoutAddress, Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod,
        PaymentStatus, StockViolation,
    },
    pricing::PricingPolicy,
    purchase_mode::{PurchaseModeResolver, max_allowed_quantity},
    response::{ApiResponse, Meta},
    routes::params::OrderQuery,
    services::address_service::AddressBook,
    state::AppState,
    store::{CatalogProduct, NewOrder, NewOrderItem, OrderStore, ProductCatalog, StoreError},
};

/// Inserts attempted before a colliding order number is treated as fatal.
pub const ORDER_NUMBER_ATTEMPTS: usize = 3;

const ORDER_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A post-commit step that did not complete. The order stands regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpFailure {
    StockDecrement { product_id: Uuid, error: String },
    ProductGone { product_id: Uuid },
    Oversold { product_id: Uuid, ordered: i32, available: i32 },
    AddressPersist { error: String },
}

impl fmt::Display for FollowUpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowUpFailure::StockDecrement { product_id, error } => {
                write!(f, "stock decrement failed for {product_id}: {error}")
            }
            FollowUpFailure::ProductGone { product_id } => {
                write!(f, "product {product_id} vanished before stock decrement")
            }
            FollowUpFailure::Oversold {
                product_id,
                ordered,
                available,
            } => write!(
                f,
                "product {product_id} oversold: ordered {ordered}, {available} on hand"
            ),
            FollowUpFailure::AddressPersist { error } => {
                write!(f, "saving checkout address failed: {error}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub follow_up_failures: Vec<FollowUpFailure>,
}

impl CheckoutOutcome {
    pub fn summary(&self) -> PlacedOrderSummary {
        PlacedOrderSummary {
            id: self.order.id,
            order_number: self.order.order_number.clone(),
            total: self.order.total,
        }
    }
}

/// One product's worth of the submitted cart after duplicate lines merge.
#[derive(Debug, Clone)]
struct CartLine {
    product_id: Uuid,
    raw_id: String,
    label: String,
    quantity: i64,
    client_price: i64,
}

/// A line that passed every check, priced from the catalog.
struct PricedLine<'a> {
    product: &'a CatalogProduct,
    quantity: i32,
}

impl PricedLine<'_> {
    fn subtotal(&self) -> i64 {
        self.product.price * i64::from(self.quantity)
    }
}

pub struct OrderService {
    catalog: Arc<dyn ProductCatalog>,
    orders: Arc<dyn OrderStore>,
    addresses: AddressBook,
    pricing: PricingPolicy,
    resolver: PurchaseModeResolver,
}

impl OrderService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        orders: Arc<dyn OrderStore>,
        addresses: AddressBook,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            catalog,
            orders,
            addresses,
            pricing,
            resolver: PurchaseModeResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: PurchaseModeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub async fn place_order(
        &self,
        caller: Option<&AuthUser>,
        request: CheckoutRequest,
    ) -> AppResult<CheckoutOutcome> {
        let user = caller.ok_or(AppError::Unauthorized)?;

        let shipping = request.shipping_address.unwrap_or_default();
        shipping.validate()?;
        let shipping = shipping.trimmed();
        let billing = billing_or_shipping(request.billing_address, &shipping)?;

        let payment_method = parse_payment_method(request.payment_method.as_deref())?;
        let lines = merge_lines(validate_items(&request.items)?);

        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products = self.catalog.find_by_ids(&ids).await?;
        let by_id: HashMap<Uuid, &CatalogProduct> = products.iter().map(|p| (p.id, p)).collect();

        let priced = self.check_rules(user, &lines, &by_id)?;

        let subtotal: i64 = priced.iter().map(PricedLine::subtotal).sum();
        let totals = self.pricing.quote(subtotal);

        let mut draft = NewOrder {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            order_number: String::new(),
            status: OrderStatus::Pending,
            payment_method,
            payment_status: PaymentStatus::Pending,
            subtotal: totals.subtotal,
            shipping: totals.shipping,
            tax: totals.tax,
            total: totals.total,
            shipping_address: shipping.clone(),
            billing_address: billing,
        };
        let order = self.insert_with_fresh_number(&mut draft).await?;

        let new_items: Vec<NewOrderItem> = priced
            .iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                product_id: Some(line.product.id),
                product_title: line.product.title.clone(),
                product_sku: line.product.sku.clone(),
                price: line.product.price,
                quantity: line.quantity,
                subtotal: line.subtotal(),
            })
            .collect();

        let items = match self.orders.insert_items(&new_items).await {
            Ok(items) => items,
            Err(err) => {
                self.roll_back(&order).await;
                return Err(err.into());
            }
        };

        tracing::info!(
            order_number = %order.order_number,
            user_id = %user.user_id,
            total = order.total,
            lines = items.len(),
            "order placed"
        );

        let mut follow_up_failures = self.decrement_stock(&order, &priced).await;
        if let Some(failure) = self.remember_address(user, &order, &shipping).await {
            follow_up_failures.push(failure);
        }

        Ok(CheckoutOutcome {
            order,
            items,
            follow_up_failures,
        })
    }

    /// Stock, then the one-device limit, then per-line unit rules.
    fn check_rules<'a>(
        &self,
        user: &AuthUser,
        lines: &[CartLine],
        by_id: &HashMap<Uuid, &'a CatalogProduct>,
    ) -> AppResult<Vec<PricedLine<'a>>> {
        let mut stock_violations = Vec::new();
        let mut rule_violations = Vec::new();
        let mut single_unit_products = 0usize;
        let mut priced = Vec::with_capacity(lines.len());

        for line in lines {
            let Some(product) = by_id.get(&line.product_id).copied() else {
                stock_violations.push(StockViolation {
                    product_id: line.raw_id.clone(),
                    name: line.label.clone(),
                    requested: line.quantity,
                    available: 0,
                });
                continue;
            };

            let stock = i64::from(product.stock.max(0));
            if line.quantity > stock {
                stock_violations.push(StockViolation {
                    product_id: line.raw_id.clone(),
                    name: product.title.clone(),
                    requested: line.quantity,
                    available: stock,
                });
                continue;
            }

            let mode = self.resolver.resolve(&product.signals());
            if mode.is_single_unit() {
                single_unit_products += 1;
                if line.quantity > max_allowed_quantity(mode, stock) {
                    rule_violations.push(format!("{} supports quantity 1 only", product.title));
                }
            }

            if line.client_price != product.price {
                tracing::debug!(
                    product_id = %product.id,
                    client_price = line.client_price,
                    catalog_price = product.price,
                    "client price ignored"
                );
            }

            // bounded by stock, which is an i32
            let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            priced.push(PricedLine { product, quantity });
        }

        if !stock_violations.is_empty() {
            tracing::info!(user_id = %user.user_id, reason = "stock", count = stock_violations.len(), "checkout rejected");
            return Err(AppError::StockViolations(stock_violations));
        }
        if single_unit_products > 1 {
            tracing::info!(user_id = %user.user_id, reason = "single_unit_limit", "checkout rejected");
            return Err(AppError::RuleViolations(vec![
                "Only one single-unit device can be ordered at a time".to_string(),
            ]));
        }
        if !rule_violations.is_empty() {
            tracing::info!(user_id = %user.user_id, reason = "single_unit_quantity", "checkout rejected");
            return Err(AppError::RuleViolations(rule_violations));
        }

        Ok(priced)
    }

    async fn insert_with_fresh_number(&self, draft: &mut NewOrder) -> AppResult<Order> {
        let mut attempt = 1;
        loop {
            draft.order_number = generate_order_number();
            match self.orders.insert_order(draft).await {
                Ok(order) => return Ok(order),
                Err(StoreError::Duplicate(detail)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    tracing::warn!(
                        order_number = %draft.order_number,
                        attempt,
                        detail = %detail,
                        "order number collision, regenerating"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn roll_back(&self, order: &Order) {
        match self.orders.delete_order(order.id).await {
            Ok(()) => tracing::warn!(
                order_number = %order.order_number,
                "order items failed to persist, order removed"
            ),
            Err(err) => tracing::error!(
                order_number = %order.order_number,
                order_id = %order.id,
                error = %err,
                "compensating delete failed, order left without items"
            ),
        }
    }

    async fn decrement_stock(&self, order: &Order, lines: &[PricedLine<'_>]) -> Vec<FollowUpFailure> {
        let mut failures = Vec::new();

        for line in lines {
            let product_id = line.product.id;
            let failure = match self.catalog.decrement_stock(product_id, line.quantity).await {
                Ok(Some(change)) if change.shortfall(line.quantity) == 0 => continue,
                Ok(Some(change)) => FollowUpFailure::Oversold {
                    product_id,
                    ordered: line.quantity,
                    available: change.previous,
                },
                Ok(None) => FollowUpFailure::ProductGone { product_id },
                Err(err) => FollowUpFailure::StockDecrement {
                    product_id,
                    error: err.to_string(),
                },
            };

            tracing::warn!(
                order_number = %order.order_number,
                product_id = %product_id,
                error = %failure,
                "stock follow-up failed"
            );
            failures.push(failure);
        }

        failures
    }

    async fn remember_address(
        &self,
        user: &AuthUser,
        order: &Order,
        shipping: &CheckoutAddress,
    ) -> Option<FollowUpFailure> {
        if !shipping.is_complete() {
            return None;
        }

        let result = match user.email.as_deref() {
            Some(email) => self
                .addresses
                .put_default_address(user.user_id, email, shipping)
                .await
                .map(|_| ()),
            None => Err(AppError::BadRequest("account has no email address".into())),
        };

        let err = result.err()?;
        tracing::warn!(
            order_number = %order.order_number,
            user_id = %user.user_id,
            error = %err,
            "address follow-up failed"
        );
        Some(FollowUpFailure::AddressPersist {
            error: err.to_string(),
        })
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<Order>, u64)> {
        Ok(self.orders.list_for_user(user_id, limit, offset).await?)
    }

    pub async fn order_by_number(&self, user_id: Uuid, order_number: &str) -> AppResult<OrderWithItems> {
        self.orders
            .find_by_number(user_id, order_number.trim())
            .await?
            .ok_or(AppError::NotFound)
    }
}

/// `ORD-<unix millis>-<6 random uppercase alphanumerics>`.
pub fn generate_order_number() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| char::from(ORDER_SUFFIX_CHARSET[rng.random_range(0..ORDER_SUFFIX_CHARSET.len())]))
        .collect();
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}

fn billing_or_shipping(
    billing: Option<CheckoutAddress>,
    shipping: &CheckoutAddress,
) -> AppResult<CheckoutAddress> {
    match billing.filter(CheckoutAddress::has_any_field) {
        None => Ok(shipping.clone()),
        Some(billing) => {
            billing
                .validate()
                .map_err(|err| AppError::Validation(format!("Billing address: {err}")))?;
            Ok(billing.trimmed())
        }
    }
}

fn parse_payment_method(raw: Option<&str>) -> AppResult<PaymentMethod> {
    let raw = raw
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("Payment method is required".into()))?;
    raw.to_ascii_lowercase()
        .parse()
        .map_err(|_| AppError::Validation(format!("Unsupported payment method '{raw}'")))
}

fn validate_items(items: &[CheckoutItemInput]) -> AppResult<Vec<CartLine>> {
    if items.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let raw_id = item.id.as_deref().map(str::trim).unwrap_or_default();
            let label = item
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .or(Some(raw_id).filter(|id| !id.is_empty()))
                .map(str::to_string)
                .unwrap_or_else(|| format!("item #{}", index + 1));

            let product_id = Uuid::parse_str(raw_id)
                .map_err(|_| AppError::Validation(format!("Invalid product id for {label}")))?;

            let quantity = item
                .quantity
                .filter(|q| q.is_finite())
                .map(|q| q.floor() as i64)
                .filter(|q| *q >= 1)
                .ok_or_else(|| AppError::Validation(format!("Invalid quantity for {label}")))?;

            let client_price = item
                .price
                .filter(|p| p.is_finite() && *p >= 0.0)
                .map(|p| p.round() as i64)
                .ok_or_else(|| AppError::Validation(format!("Invalid price for {label}")))?;

            Ok(CartLine {
                product_id,
                raw_id: raw_id.to_string(),
                label,
                quantity,
                client_price,
            })
        })
        .collect()
}

/// Collapses lines for the same product, summing quantities, keeping the
/// first line's position and labels.
fn merge_lines(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line),
        }
    }
    merged
}

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<PlaceOrderResponse>> {
    let outcome = state.orders.place_order(Some(user), payload).await?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderPlaced,
        Some("orders"),
        Some(serde_json::json!({
            "order_id": outcome.order.id,
            "order_number": outcome.order.order_number,
            "follow_up_failures": outcome
                .follow_up_failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        PlaceOrderResponse {
            order: outcome.summary(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderQuery,
) -> AppResult<ApiResponse<OrdersPayload>> {
    if let Some(number) = query.order_number.as_deref().filter(|n| !n.trim().is_empty()) {
        let order = state.orders.order_by_number(user.user_id, number).await?;
        return Ok(ApiResponse::success(
            "Order",
            OrdersPayload::Single(order),
            Some(Meta::empty()),
        ));
    }

    let (page, limit, offset) = query.pagination().normalize();
    let (items, total) = state
        .orders
        .list_orders(user.user_id, limit as u64, offset as u64)
        .await?;

    Ok(ApiResponse::paged(
        "Orders",
        OrdersPayload::List(OrderList { items }),
        page,
        limit,
        total as i64,
    ))
}
