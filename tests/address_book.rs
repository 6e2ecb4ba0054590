mod common;

use std::sync::Arc;

use common::{FakeAddresses, address};
use refurb_storefront::{
    error::AppError,
    models::CheckoutAddress,
    services::address_service::{AddressBook, CHECKOUT_DEFAULT_ID},
};
use serde_json::json;
use uuid::Uuid;

fn book() -> (Arc<FakeAddresses>, AddressBook) {
    let store = Arc::new(FakeAddresses::default());
    (store.clone(), AddressBook::new(store))
}

#[tokio::test]
async fn no_saved_addresses_yields_none() {
    let (_, book) = book();
    assert_eq!(book.get_default_address(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn legacy_records_are_read_through_their_aliases() {
    let (store, book) = book();
    let user_id = Uuid::new_v4();
    store.seed(
        user_id,
        "ravi@example.com",
        vec![
            json!({ "id": "blank", "label": "Empty" }),
            json!({
                "id": "work",
                "fullName": "Ravi Kumar",
                "mobile": "9000000001",
                "street": "4 Park Street",
                "city": "Kolkata",
                "state": "West Bengal",
                "zip": "700016",
                "isDefault": true,
            }),
        ],
    );

    let found = book.get_default_address(user_id).await.unwrap().unwrap();
    assert_eq!(found.full_name, "Ravi Kumar");
    assert_eq!(found.phone, "9000000001");
    assert_eq!(found.address, "4 Park Street");
    assert_eq!(found.pincode, "700016");
}

#[tokio::test]
async fn repeated_saves_keep_one_reserved_entry() {
    let (store, book) = book();
    let user_id = Uuid::new_v4();
    store.seed(
        user_id,
        "asha@example.com",
        vec![json!({ "id": "home", "full_name": "Home", "is_default": true })],
    );

    book.put_default_address(user_id, "asha@example.com", &address())
        .await
        .unwrap();
    let moved = CheckoutAddress {
        city: "Mysuru".into(),
        pincode: "570001".into(),
        ..address()
    };
    let stored = book
        .put_default_address(user_id, "asha@example.com", &moved)
        .await
        .unwrap();
    assert_eq!(stored, moved);

    let list = store.list_for(user_id);
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["id"], CHECKOUT_DEFAULT_ID);
    assert_eq!(list[0]["city"], "Mysuru");
    assert_eq!(list[1].get("id"), None);
    assert_eq!(list[1]["city"], "Bengaluru");
    assert_eq!(list[1]["is_default"], false);
    assert_eq!(list[2]["id"], "home");
    assert_eq!(list[2]["is_default"], false);
    assert_eq!(
        list.iter()
            .filter(|r| r.get("id").and_then(|v| v.as_str()) == Some(CHECKOUT_DEFAULT_ID))
            .count(),
        1
    );

    book.put_default_address(user_id, "asha@example.com", &moved)
        .await
        .unwrap();
    assert_eq!(store.list_for(user_id).len(), 3);

    let found = book.get_default_address(user_id).await.unwrap().unwrap();
    assert_eq!(found, moved);
}

#[tokio::test]
async fn invalid_address_is_not_written() {
    let (store, book) = book();
    let user_id = Uuid::new_v4();
    let bad = CheckoutAddress {
        phone: "98450".into(),
        ..address()
    };

    let err = book
        .put_default_address(user_id, "asha@example.com", &bad)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.to_string(), "Phone number must have at least 10 digits");
    assert!(store.list_for(user_id).is_empty());
}

#[tokio::test]
async fn stored_values_are_trimmed() {
    let (_, book) = book();
    let padded = CheckoutAddress {
        full_name: " Asha Rao ".into(),
        state: "Karnataka  ".into(),
        ..address()
    };
    let stored = book
        .put_default_address(Uuid::new_v4(), "asha@example.com", &padded)
        .await
        .unwrap();
    assert_eq!(stored, address());
}
