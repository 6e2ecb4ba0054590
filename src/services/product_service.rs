use uuid::Uuid;

use crate::{
    audit::{AuditAction, record_audit},
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        Categories,
        categories::{Column as CategoryCol, Model as CategoryModel},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::ProductView,
    purchase_mode::{CategoryHint, ProductSignals, max_allowed_quantity, resolve_purchase_mode},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
    store::{StoreError, product_from_entity},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, DbErr,
};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::ActiveValue::NotSet;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(slug) = query.category.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let linked = Query::select()
            .column(CategoryCol::Id)
            .from(Categories)
            .and_where(CategoryCol::Slug.eq(slug))
            .to_owned();
        condition = condition.add(
            Condition::any()
                .add(Column::CategorySlug.eq(slug))
                .add(Column::CategoryId.in_subquery(linked)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Title => Column::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .find_also_related(Categories)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(product, category)| product_view(product, category))
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductView>> {
    let (product, category) = Products::find_by_id(id)
        .find_also_related(Categories)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Product",
        product_view(product, category),
        Some(Meta::empty()),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductView>> {
    ensure_admin(user)?;
    validate_amounts(Some(payload.price), Some(payload.stock))?;
    let title = required_title(&payload.title)?;
    let category = find_category(state, payload.category_id).await?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        description: Set(payload.description),
        sku: Set(payload.sku),
        price: Set(payload.price),
        stock: Set(payload.stock),
        purchase_mode: Set(payload.purchase_mode.map(|m| m.as_str().to_string())),
        is_single_unit: Set(payload.is_single_unit),
        category_id: Set(category.as_ref().map(|c| c.id)),
        category_slug: Set(category.as_ref().map(|c| c.slug.clone())),
        image_url: Set(payload.image_url),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await.map_err(title_conflict)?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductCreated,
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_view(product, category),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductView>> {
    ensure_admin(user)?;
    validate_amounts(payload.price, payload.stock)?;

    let (existing, mut category) = Products::find_by_id(id)
        .find_also_related(Categories)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(required_title(&title)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(sku) = payload.sku {
        active.sku = Set(Some(sku));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(mode) = payload.purchase_mode {
        active.purchase_mode = Set(Some(mode.as_str().to_string()));
    }
    if let Some(flag) = payload.is_single_unit {
        active.is_single_unit = Set(Some(flag));
    }
    if payload.category_id.is_some() {
        category = find_category(state, payload.category_id).await?;
        active.category_id = Set(category.as_ref().map(|c| c.id));
        active.category_slug = Set(category.as_ref().map(|c| c.slug.clone()));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }

    let product = active.update(&state.orm).await.map_err(title_conflict)?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductUpdated,
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_view(product, category),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    record_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductDeleted,
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// The stored record with its resolved purchase mode and orderable cap.
pub fn product_view(model: ProductModel, category: Option<CategoryModel>) -> ProductView {
    let (mode, max_quantity) = {
        let signals = ProductSignals {
            purchase_mode: model.purchase_mode.as_deref(),
            is_single_unit: model.is_single_unit,
            category_slug: model.category_slug.as_deref(),
            category: category.as_ref().map(|c| CategoryHint {
                slug: Some(c.slug.as_str()),
                name: Some(c.name.as_str()),
                display_name: c.display_name.as_deref(),
            }),
        };
        let mode = resolve_purchase_mode(&signals);
        (mode, max_allowed_quantity(mode, i64::from(model.stock)))
    };

    ProductView {
        product: product_from_entity(model),
        effective_purchase_mode: mode,
        max_quantity,
    }
}

async fn find_category(state: &AppState, id: Option<Uuid>) -> AppResult<Option<CategoryModel>> {
    let Some(id) = id else {
        return Ok(None);
    };
    Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown category {id}")))
}

fn required_title(raw: &str) -> AppResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    Ok(title.to_string())
}

pub(crate) fn validate_amounts(price: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::Validation("Price must not be negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::Validation("Stock must not be negative".into()));
    }
    Ok(())
}

fn title_conflict(err: DbErr) -> AppError {
    match StoreError::from(err) {
        StoreError::Duplicate(_) => {
            AppError::BadRequest("A product with this title already exists".into())
        }
        other => AppError::Store(other),
    }
}
