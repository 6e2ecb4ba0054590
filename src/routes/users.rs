use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::address::{PutAddressRequest, PutAddressResponse, SavedAddressResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::address_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/address", get(get_address).put(put_address))
}

#[utoipa::path(
    get,
    path = "/api/users/address",
    responses(
        (status = 200, description = "Saved checkout address, or null", body = ApiResponse<SavedAddressResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_address(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SavedAddressResponse>>> {
    let resp = address_service::get_address(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/users/address",
    request_body = PutAddressRequest,
    responses(
        (status = 200, description = "Address saved as checkout default", body = ApiResponse<PutAddressResponse>),
        (status = 400, description = "Incomplete or invalid address"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn put_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PutAddressRequest>,
) -> AppResult<Json<ApiResponse<PutAddressResponse>>> {
    let resp = address_service::put_address(&state, &user, payload).await?;
    Ok(Json(resp))
}
