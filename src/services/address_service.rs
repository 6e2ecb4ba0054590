//! The saved-address book: one canonical "checkout default" entry inside a
//! user's loosely-shaped address list.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    dto::address::{PutAddressRequest, PutAddressResponse, SavedAddressResponse},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CheckoutAddress,
    response::{ApiResponse, Meta},
    state::AppState,
    store::{AddressStore, StoreError},
};

/// Identifier reserved for the entry written by checkout.
pub const CHECKOUT_DEFAULT_ID: &str = "checkout-default";

const FULL_NAME_KEYS: &[&str] = &["full_name", "fullName", "name"];
const PHONE_KEYS: &[&str] = &["phone", "phone_number", "phoneNumber", "mobile"];
const ADDRESS_KEYS: &[&str] = &["address", "address_line1", "addressLine1", "line1", "street"];
const CITY_KEYS: &[&str] = &["city"];
const STATE_KEYS: &[&str] = &["state"];
const PINCODE_KEYS: &[&str] = &["pincode", "postal_code", "postalCode", "zip"];

#[derive(Clone)]
pub struct AddressBook {
    store: Arc<dyn AddressStore>,
}

impl AddressBook {
    pub fn new(store: Arc<dyn AddressStore>) -> Self {
        Self { store }
    }

    pub async fn get_default_address(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CheckoutAddress>, StoreError> {
        let records = self.store.load_addresses(user_id).await?;
        Ok(pick_default(&records))
    }

    /// Validates, then writes `address` as the reserved default at the front
    /// of the user's list. Returns the stored (trimmed) address.
    pub async fn put_default_address(
        &self,
        user_id: Uuid,
        email: &str,
        address: &CheckoutAddress,
    ) -> AppResult<CheckoutAddress> {
        address.validate()?;
        let address = address.trimmed();

        let existing = self.store.load_addresses(user_id).await?;
        let merged = merge_default(existing, &address);
        self.store.save_addresses(user_id, email, merged).await?;

        Ok(address)
    }
}

/// Reserved entry first, then one flagged default, then list order; the
/// first candidate with any populated field wins.
pub fn pick_default(records: &[Value]) -> Option<CheckoutAddress> {
    let reserved = records.iter().filter(|r| is_reserved(r));
    let flagged = records.iter().filter(|r| is_flagged_default(r));

    reserved
        .chain(flagged)
        .chain(records.iter())
        .map(address_from_record)
        .find(CheckoutAddress::has_any_field)
}

pub fn address_from_record(record: &Value) -> CheckoutAddress {
    let Some(fields) = record.as_object() else {
        return CheckoutAddress::default();
    };

    CheckoutAddress {
        full_name: first_text(fields, FULL_NAME_KEYS),
        phone: first_text(fields, PHONE_KEYS),
        address: first_text(fields, ADDRESS_KEYS),
        city: first_text(fields, CITY_KEYS),
        state: first_text(fields, STATE_KEYS),
        pincode: first_text(fields, PINCODE_KEYS),
    }
}

fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| match fields.get(*key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn is_reserved(record: &Value) -> bool {
    record.get("id").and_then(Value::as_str) == Some(CHECKOUT_DEFAULT_ID)
}

fn is_flagged_default(record: &Value) -> bool {
    ["is_default", "isDefault"]
        .iter()
        .any(|key| record.get(*key).and_then(Value::as_bool) == Some(true))
}

fn default_record(address: &CheckoutAddress) -> Value {
    json!({
        "id": CHECKOUT_DEFAULT_ID,
        "label": "Checkout",
        "full_name": address.full_name,
        "phone": address.phone,
        "address": address.address,
        "city": address.city,
        "state": address.state,
        "pincode": address.pincode,
        "is_default": true,
    })
}

/// New default record at the front. An earlier reserved entry is kept as an
/// ordinary address without the reserved id, every other entry loses its
/// default flag, and entries holding the same address as the new default
/// are dropped.
pub fn merge_default(existing: Vec<Value>, address: &CheckoutAddress) -> Vec<Value> {
    let mut merged = Vec::with_capacity(existing.len() + 1);
    merged.push(default_record(address));

    for mut record in existing {
        if address_from_record(&record) == *address {
            continue;
        }
        let reserved = is_reserved(&record);
        if let Some(fields) = record.as_object_mut() {
            if reserved {
                fields.remove("id");
            }
            fields.remove("isDefault");
            if fields.contains_key("is_default") {
                fields.insert("is_default".into(), Value::Bool(false));
            }
        }
        merged.push(record);
    }
    merged
}

pub async fn get_address(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SavedAddressResponse>> {
    let address = state.addresses.get_default_address(user.user_id).await?;
    Ok(ApiResponse::success(
        "Address",
        SavedAddressResponse { address },
        Some(Meta::empty()),
    ))
}

pub async fn put_address(
    state: &AppState,
    user: &AuthUser,
    payload: PutAddressRequest,
) -> AppResult<ApiResponse<PutAddressResponse>> {
    let email = user
        .email
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Account has no email address".into()))?;
    let address = payload.address.unwrap_or_default();

    let address = state
        .addresses
        .put_default_address(user.user_id, email, &address)
        .await?;

    Ok(ApiResponse::success(
        "Address saved",
        PutAddressResponse {
            success: true,
            address,
        },
        Some(Meta::empty()),
    ))
}
