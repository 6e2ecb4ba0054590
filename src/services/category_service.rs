use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, record_audit},
    dto::categories::{CategoryList, CreateCategoryRequest},
    entity::categories::{ActiveModel, Column, Entity as Categories},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Category,
    purchase_mode::normalize_category_key,
    response::{ApiResponse, Meta},
    state::AppState,
    store::{StoreError, category_from_entity},
};

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(category_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    // slugs share the purchase-mode key format so allow-list lookups match
    let slug = normalize_category_key(&payload.slug);
    if slug.is_empty() {
        return Err(AppError::Validation("Slug is required".into()));
    }

    let category = ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slug),
        name: Set(name),
        display_name: Set(payload.display_name.filter(|d| !d.trim().is_empty())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match StoreError::from(err) {
        StoreError::Duplicate(_) => AppError::BadRequest("Category slug already exists".into()),
        other => AppError::Store(other),
    })?;

    record_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::CategoryCreated,
        Some("categories"),
        Some(serde_json::json!({ "category_id": category.id, "slug": category.slug })),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        category_from_entity(category),
        Some(Meta::empty()),
    ))
}
