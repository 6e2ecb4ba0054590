use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
    ActiveValue::NotSet,
    sea_query::OnConflict,
};
use serde_json::Value;
use uuid::Uuid;

use super::{
    AddressStore, CatalogProduct, CategoryInfo, NewOrder, NewOrderItem, OrderStore,
    ProductCatalog, StockDecrement, StoreError,
};
use crate::{
    db::{DbPool, OrmConn},
    entity::{
        Categories, OrderItems, Orders, Products, UserProfiles,
        categories::Model as CategoryModel,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        products::{Column as ProdCol, Model as ProductModel},
        user_profiles::{ActiveModel as ProfileActive, Column as ProfileCol},
    },
    models::{Category, Order, OrderItem, OrderWithItems, Product},
};

/// Postgres-backed implementation of every persistence port.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    orm: OrmConn,
}

impl PgStore {
    pub fn new(pool: DbPool, orm: OrmConn) -> Self {
        Self { pool, orm }
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogProduct>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Products::find()
            .filter(ProdCol::Id.is_in(ids.iter().copied()))
            .find_also_related(Categories)
            .all(&self.orm)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, category)| catalog_product(product, category))
            .collect())
    }

    async fn decrement_stock(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<StockDecrement>, StoreError> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            r#"
            UPDATE products AS p
            SET stock = GREATEST(p.stock - $2, 0)
            FROM (SELECT id, stock FROM products WHERE id = $1 FOR UPDATE) AS prev
            WHERE p.id = prev.id
            RETURNING prev.stock, p.stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(previous, remaining)| StockDecrement {
            previous,
            remaining,
        }))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        let model = OrderActive {
            id: Set(order.id),
            user_id: Set(order.user_id),
            order_number: Set(order.order_number.clone()),
            status: Set(order.status.as_str().to_string()),
            payment_method: Set(order.payment_method.as_str().to_string()),
            payment_status: Set(order.payment_status.as_str().to_string()),
            subtotal: Set(order.subtotal),
            shipping: Set(order.shipping),
            tax: Set(order.tax),
            total: Set(order.total),
            shipping_address: Set(to_json(&order.shipping_address)?),
            billing_address: Set(to_json(&order.billing_address)?),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&self.orm)
        .await?;

        order_from_entity(model)
    }

    async fn insert_items(&self, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, StoreError> {
        let txn = self.orm.begin().await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let model = OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(item.order_id),
                product_id: Set(item.product_id),
                product_title: Set(item.product_title.clone()),
                product_sku: Set(item.product_sku.clone()),
                price: Set(item.price),
                quantity: Set(item.quantity),
                subtotal: Set(item.subtotal),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
            inserted.push(order_item_from_entity(model));
        }

        txn.commit().await?;
        Ok(inserted)
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), StoreError> {
        Orders::delete_by_id(id).exec(&self.orm).await?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let finder = Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_desc(OrderCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await?;

        let orders = finder
            .limit(limit)
            .offset(offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((orders, total))
    }

    async fn find_by_number(
        &self,
        user_id: Uuid,
        order_number: &str,
    ) -> Result<Option<OrderWithItems>, StoreError> {
        let order = Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::UserId.eq(user_id))
                    .add(OrderCol::OrderNumber.eq(order_number)),
            )
            .one(&self.orm)
            .await?;
        let Some(order) = order else {
            return Ok(None);
        };

        let items = load_items(&self.orm, order.id).await?;
        Ok(Some(OrderWithItems {
            order: order_from_entity(order)?,
            items,
        }))
    }
}

#[async_trait]
impl AddressStore for PgStore {
    async fn load_addresses(&self, user_id: Uuid) -> Result<Vec<Value>, StoreError> {
        let profile = UserProfiles::find()
            .filter(ProfileCol::UserId.eq(user_id))
            .order_by_desc(ProfileCol::UpdatedAt)
            .one(&self.orm)
            .await?;

        Ok(match profile.map(|p| p.addresses) {
            Some(Value::Array(list)) => list,
            _ => Vec::new(),
        })
    }

    async fn save_addresses(
        &self,
        user_id: Uuid,
        email: &str,
        addresses: Vec<Value>,
    ) -> Result<(), StoreError> {
        let profile = ProfileActive {
            email: Set(email.to_string()),
            user_id: Set(user_id),
            addresses: Set(Value::Array(addresses)),
            updated_at: Set(Utc::now().into()),
        };

        UserProfiles::insert(profile)
            .on_conflict(
                OnConflict::column(ProfileCol::Email)
                    .update_columns([
                        ProfileCol::UserId,
                        ProfileCol::Addresses,
                        ProfileCol::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.orm)
            .await?;
        Ok(())
    }
}

pub(crate) async fn load_items(orm: &OrmConn, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Backend(err.to_string()))
}

fn catalog_product(product: ProductModel, category: Option<CategoryModel>) -> CatalogProduct {
    CatalogProduct {
        id: product.id,
        title: product.title,
        sku: product.sku,
        price: product.price,
        stock: product.stock,
        purchase_mode: product.purchase_mode,
        is_single_unit: product.is_single_unit,
        category_slug: product.category_slug,
        category: category.map(|c| CategoryInfo {
            slug: Some(c.slug),
            name: Some(c.name),
            display_name: c.display_name,
        }),
    }
}

pub(crate) fn order_from_entity(model: OrderModel) -> Result<Order, StoreError> {
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        status: model.status.parse().map_err(StoreError::Backend)?,
        payment_method: model.payment_method.parse().map_err(StoreError::Backend)?,
        payment_status: model.payment_status.parse().map_err(StoreError::Backend)?,
        subtotal: model.subtotal,
        shipping: model.shipping,
        tax: model.tax,
        total: model.total,
        shipping_address: serde_json::from_value(model.shipping_address).unwrap_or_default(),
        billing_address: serde_json::from_value(model.billing_address).unwrap_or_default(),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_title: model.product_title,
        product_sku: model.product_sku,
        price: model.price,
        quantity: model.quantity,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        title: model.title,
        description: model.description,
        sku: model.sku,
        price: model.price,
        stock: model.stock,
        purchase_mode: model.purchase_mode,
        is_single_unit: model.is_single_unit,
        category_id: model.category_id,
        category_slug: model.category_slug,
        image_url: model.image_url,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        slug: model.slug,
        name: model.name,
        display_name: model.display_name,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
