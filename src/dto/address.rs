use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::CheckoutAddress;

#[derive(Debug, Serialize, ToSchema)]
pub struct SavedAddressResponse {
    pub address: Option<CheckoutAddress>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PutAddressRequest {
    pub address: Option<CheckoutAddress>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PutAddressResponse {
    pub success: bool,
    pub address: CheckoutAddress,
}
