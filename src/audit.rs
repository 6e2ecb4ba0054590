use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    OrderPlaced,
    OrderStatusUpdated,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    InventoryAdjusted,
    CategoryCreated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderPlaced => "order_placed",
            AuditAction::OrderStatusUpdated => "order_status_update",
            AuditAction::ProductCreated => "product_create",
            AuditAction::ProductUpdated => "product_update",
            AuditAction::ProductDeleted => "product_delete",
            AuditAction::InventoryAdjusted => "inventory_adjust",
            AuditAction::CategoryCreated => "category_create",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action.as_str())
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Like [`log_audit`], but a failed write is only logged.
pub async fn record_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    if let Err(err) = log_audit(pool, user_id, action, resource, metadata).await {
        tracing::warn!(action = action.as_str(), error = %err, "audit log failed");
    }
}
