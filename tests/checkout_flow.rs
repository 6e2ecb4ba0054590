mod common;

use std::sync::{Arc, atomic::Ordering};

use async_trait::async_trait;
use common::{Harness, accessory, address, customer, line, product, request, single_unit};
use mockall::mock;
use refurb_storefront::{
    dto::orders::CheckoutItemInput,
    error::AppError,
    middleware::auth::AuthUser,
    models::{CheckoutAddress, PaymentMethod, StockViolation},
    purchase_mode::{ProductSignals, PurchaseMode, PurchaseModeResolver},
    services::{
        address_service::CHECKOUT_DEFAULT_ID,
        order_service::{FollowUpFailure, ORDER_NUMBER_ATTEMPTS},
    },
    store::{AddressStore, StoreError},
};
use serde_json::{Value, json};
use uuid::Uuid;

mock! {
    pub Addresses {}

    #[async_trait]
    impl AddressStore for Addresses {
        async fn load_addresses(&self, user_id: Uuid) -> Result<Vec<Value>, StoreError>;
        async fn save_addresses(
            &self,
            user_id: Uuid,
            email: &str,
            addresses: Vec<Value>,
        ) -> Result<(), StoreError>;
    }
}

#[tokio::test]
async fn split_single_unit_lines_merge_and_are_rejected() {
    let phone = single_unit("single1", 20_000, 5);
    let h = Harness::new(vec![phone.clone()]);

    let err = h
        .service
        .place_order(
            Some(&customer()),
            request(vec![line(&phone, 1.0), line(&phone, 1.0)]),
        )
        .await
        .unwrap_err();

    match err {
        AppError::RuleViolations(messages) => {
            assert_eq!(messages, vec!["single1 supports quantity 1 only".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.orders.order_count(), 0);
    assert_eq!(h.orders.insert_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn insufficient_stock_rejects_without_touching_inventory() {
    let cable = accessory("prod1", 500, 3);
    let h = Harness::new(vec![cable.clone()]);

    let err = h
        .service
        .place_order(Some(&customer()), request(vec![line(&cable, 5.0)]))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        format!("Insufficient stock: prod1 [{}] (requested 5, available 3)", cable.id)
    );
    match err {
        AppError::StockViolations(violations) => assert_eq!(
            violations,
            vec![StockViolation {
                product_id: cable.id.to_string(),
                name: "prod1".into(),
                requested: 5,
                available: 3,
            }]
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.catalog.decrements.lock().unwrap().is_empty());
    assert_eq!(h.catalog.stock_of(cable.id), Some(3));
    assert_eq!(h.orders.order_count(), 0);
}

#[tokio::test]
async fn every_stock_violation_is_reported_together() {
    let case = accessory("Case", 300, 1);
    let charger = accessory("Charger", 900, 0);
    let missing = Uuid::new_v4();
    let h = Harness::new(vec![case.clone(), charger.clone()]);

    let items = vec![
        line(&case, 2.0),
        line(&charger, 1.0),
        CheckoutItemInput::new(missing.to_string(), 1.0, 100.0).named("Old Stock"),
    ];
    let err = h
        .service
        .place_order(Some(&customer()), request(items))
        .await
        .unwrap_err();

    let AppError::StockViolations(violations) = err else {
        panic!("expected stock violations");
    };
    let summary: Vec<(&str, i64, i64)> = violations
        .iter()
        .map(|v| (v.name.as_str(), v.requested, v.available))
        .collect();
    assert_eq!(
        summary,
        vec![("Case", 2, 1), ("Charger", 1, 0), ("Old Stock", 1, 0)]
    );
}

#[tokio::test]
async fn two_different_devices_hit_the_one_device_limit() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let watch = single_unit("Galaxy Watch", 9_000, 2);
    let h = Harness::new(vec![phone.clone(), watch.clone()]);

    let err = h
        .service
        .place_order(
            Some(&customer()),
            request(vec![line(&phone, 1.0), line(&watch, 1.0)]),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Only one single-unit device can be ordered at a time"
    );
    assert_eq!(h.orders.order_count(), 0);
}

#[tokio::test]
async fn shipping_is_free_above_the_threshold() {
    let laptop = single_unit("ThinkPad X1", 60_000, 1);
    let h = Harness::new(vec![laptop.clone()]);

    let outcome = h
        .service
        .place_order(Some(&customer()), request(vec![line(&laptop, 1.0)]))
        .await
        .unwrap();

    assert_eq!(outcome.order.subtotal, 60_000);
    assert_eq!(outcome.order.shipping, 0);
    assert_eq!(outcome.order.tax, 10_800);
    assert_eq!(outcome.order.total, 70_800);
}

#[tokio::test]
async fn flat_shipping_applies_below_the_threshold() {
    let tablet = single_unit("iPad Air", 20_000, 1);
    let h = Harness::new(vec![tablet.clone()]);

    let outcome = h
        .service
        .place_order(Some(&customer()), request(vec![line(&tablet, 1.0)]))
        .await
        .unwrap();

    assert_eq!(outcome.order.shipping, 200);
    assert_eq!(outcome.order.tax, 3_600);
    assert_eq!(outcome.order.total, 23_800);
    assert_eq!(outcome.summary().total, 23_800);
}

#[tokio::test]
async fn failed_line_insert_removes_the_order() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);
    h.orders.fail_items.store(true, Ordering::SeqCst);

    let err = h
        .service
        .place_order(Some(&customer()), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(StoreError::Backend(_))));
    assert_eq!(h.orders.insert_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(h.orders.order_count(), 0);
    assert!(h.catalog.decrements.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_compensating_delete_still_reports_the_insert_error() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);
    h.orders.fail_items.store(true, Ordering::SeqCst);
    h.orders.fail_delete.store(true, Ordering::SeqCst);

    let err = h
        .service
        .place_order(Some(&customer()), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Storage error: order_items insert rejected");
    assert_eq!(h.orders.order_count(), 1);
}

#[tokio::test]
async fn prices_come_from_the_catalog() {
    let case = accessory("Case", 450, 10);
    let h = Harness::new(vec![case.clone()]);

    let tampered = CheckoutItemInput::new(case.id.to_string(), 2.0, 1.0).named("Case");
    let outcome = h
        .service
        .place_order(Some(&customer()), request(vec![tampered]))
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].price, 450);
    assert_eq!(outcome.items[0].subtotal, 900);
    assert_eq!(outcome.order.subtotal, 900);
}

#[tokio::test]
async fn anonymous_checkout_is_unauthorized() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);

    let err = h
        .service
        .place_order(None, request(vec![line(&phone, 1.0)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized));
}

#[tokio::test]
async fn address_and_payment_are_validated_before_the_cart() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);
    let user = customer();

    let mut no_city = request(vec![]);
    no_city.shipping_address = Some(CheckoutAddress {
        city: "  ".into(),
        ..address()
    });
    let err = h.service.place_order(Some(&user), no_city).await.unwrap_err();
    assert_eq!(err.to_string(), "City is required");

    let mut short_pin = request(vec![line(&phone, 1.0)]);
    short_pin.shipping_address = Some(CheckoutAddress {
        pincode: "56001".into(),
        ..address()
    });
    let err = h.service.place_order(Some(&user), short_pin).await.unwrap_err();
    assert_eq!(err.to_string(), "Pincode must be exactly 6 digits");

    let mut bad_billing = request(vec![line(&phone, 1.0)]);
    bad_billing.billing_address = Some(CheckoutAddress {
        phone: "12345".into(),
        ..address()
    });
    let err = h.service.place_order(Some(&user), bad_billing).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Billing address: Phone number must have at least 10 digits"
    );

    let mut no_payment = request(vec![line(&phone, 1.0)]);
    no_payment.payment_method = Some(" ".into());
    let err = h.service.place_order(Some(&user), no_payment).await.unwrap_err();
    assert_eq!(err.to_string(), "Payment method is required");

    let err = h
        .service
        .place_order(Some(&user), request(vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cart is empty");

    assert_eq!(h.orders.order_count(), 0);
}

#[tokio::test]
async fn successful_checkout_decrements_stock_and_saves_the_address() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let case = accessory("Case", 450, 10);
    let h = Harness::new(vec![phone.clone(), case.clone()]);
    let user = customer();
    h.addresses.seed(
        user.user_id,
        "asha@example.com",
        vec![json!({ "id": "home", "full_name": "Home", "is_default": true })],
    );

    let mut checkout = request(vec![line(&phone, 1.0), line(&case, 3.0)]);
    checkout.payment_method = Some("online".into());
    let outcome = h.service.place_order(Some(&user), checkout).await.unwrap();

    assert!(outcome.follow_up_failures.is_empty());
    assert!(outcome.order.order_number.starts_with("ORD-"));
    assert_eq!(outcome.order.payment_method, PaymentMethod::Online);
    assert_eq!(outcome.order.billing_address, address());
    assert_eq!(outcome.items.len(), 2);

    assert_eq!(h.catalog.stock_of(phone.id), Some(1));
    assert_eq!(h.catalog.stock_of(case.id), Some(7));

    let saved = h.addresses.list_for(user.user_id);
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0]["id"], CHECKOUT_DEFAULT_ID);
    assert_eq!(saved[0]["pincode"], "560001");
    assert_eq!(saved[1]["id"], "home");
    assert_eq!(saved[1]["is_default"], false);
}

#[tokio::test]
async fn stock_follow_up_failures_do_not_fail_the_order() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);
    h.catalog.fail_decrement.store(true, Ordering::SeqCst);

    let outcome = h
        .service
        .place_order(Some(&customer()), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap();

    assert_eq!(h.orders.order_count(), 1);
    assert_eq!(
        outcome.follow_up_failures,
        vec![FollowUpFailure::StockDecrement {
            product_id: phone.id,
            error: "stock update timed out".into(),
        }]
    );
}

#[tokio::test]
async fn concurrent_sale_is_reported_as_oversold() {
    let case = accessory("Case", 450, 4);
    let h = Harness::new(vec![case.clone()]);
    h.catalog.sell_elsewhere(case.id, 3);

    let outcome = h
        .service
        .place_order(Some(&customer()), request(vec![line(&case, 2.0)]))
        .await
        .unwrap();

    assert_eq!(h.catalog.stock_of(case.id), Some(0));
    assert_eq!(
        outcome.follow_up_failures,
        vec![FollowUpFailure::Oversold {
            product_id: case.id,
            ordered: 2,
            available: 1,
        }]
    );
}

#[tokio::test]
async fn account_without_email_keeps_the_order_but_not_the_address() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);
    let user = AuthUser {
        email: None,
        ..customer()
    };

    let outcome = h
        .service
        .place_order(Some(&user), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap();

    assert_eq!(outcome.follow_up_failures.len(), 1);
    assert!(matches!(
        outcome.follow_up_failures[0],
        FollowUpFailure::AddressPersist { .. }
    ));
    assert!(h.addresses.list_for(user.user_id).is_empty());
    assert_eq!(h.catalog.stock_of(phone.id), Some(1));
}

#[tokio::test]
async fn address_store_outage_is_a_follow_up_failure() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let mut store = MockAddresses::new();
    store.expect_load_addresses().returning(|_| Ok(Vec::new()));
    store
        .expect_save_addresses()
        .times(1)
        .returning(|_, _, _| Err(StoreError::Backend("profiles table locked".into())));
    let h = Harness::with_address_store(vec![phone.clone()], Arc::new(store));

    let outcome = h
        .service
        .place_order(Some(&customer()), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap();

    assert_eq!(
        outcome.follow_up_failures,
        vec![FollowUpFailure::AddressPersist {
            error: "Storage error: profiles table locked".into(),
        }]
    );
    assert_eq!(h.orders.order_count(), 1);
}

#[tokio::test]
async fn order_number_collisions_are_retried() {
    let phone = single_unit("Pixel 7", 24_000, 5);
    let h = Harness::new(vec![phone.clone()]);
    h.orders
        .collisions_left
        .store(ORDER_NUMBER_ATTEMPTS - 1, Ordering::SeqCst);

    h.service
        .place_order(Some(&customer()), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap();
    assert_eq!(
        h.orders.insert_attempts.load(Ordering::SeqCst),
        ORDER_NUMBER_ATTEMPTS
    );

    let h = Harness::new(vec![phone.clone()]);
    h.orders
        .collisions_left
        .store(ORDER_NUMBER_ATTEMPTS, Ordering::SeqCst);
    let err = h
        .service
        .place_order(Some(&customer()), request(vec![line(&phone, 1.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Store(StoreError::Duplicate(_))));
    assert_eq!(h.orders.order_count(), 0);
}

#[tokio::test]
async fn blank_billing_falls_back_to_shipping() {
    let phone = single_unit("Pixel 7", 24_000, 2);
    let h = Harness::new(vec![phone.clone()]);

    let mut checkout = request(vec![line(&phone, 1.0)]);
    checkout.billing_address = Some(CheckoutAddress::default());
    checkout.shipping_address = Some(CheckoutAddress {
        full_name: "  Asha Rao ".into(),
        ..address()
    });
    let outcome = h.service.place_order(Some(&customer()), checkout).await.unwrap();

    assert_eq!(outcome.order.shipping_address, address());
    assert_eq!(outcome.order.billing_address, address());
}

#[tokio::test]
async fn history_is_scoped_to_the_caller() {
    let case = accessory("Case", 450, 10);
    let h = Harness::new(vec![case.clone()]);
    let user = customer();
    let other = customer();

    let first = h
        .service
        .place_order(Some(&user), request(vec![line(&case, 1.0)]))
        .await
        .unwrap();
    let second = h
        .service
        .place_order(Some(&user), request(vec![line(&case, 2.0)]))
        .await
        .unwrap();

    let (orders, total) = h.service.list_orders(user.user_id, 10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(orders[0].id, second.order.id);

    let found = h
        .service
        .order_by_number(user.user_id, &format!(" {} ", first.order.order_number))
        .await
        .unwrap();
    assert_eq!(found.order.id, first.order.id);
    assert_eq!(found.items.len(), 1);

    let err = h
        .service
        .order_by_number(other.user_id, &first.order.order_number)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let (orders, total) = h.service.list_orders(other.user_id, 10, 0).await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn unknown_product_ids_are_validation_errors() {
    let h = Harness::new(vec![product("Pixel 7", 24_000, 1)]);
    let item = CheckoutItemInput::new("not-a-uuid", 1.0, 10.0).named("Mystery");

    let err = h
        .service
        .place_order(Some(&customer()), request(vec![item]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid product id for Mystery");
}

fn cables_are_multi_unit(product: &ProductSignals<'_>) -> Option<PurchaseMode> {
    (product.category_slug == Some("cables")).then_some(PurchaseMode::MultiUnit)
}

#[tokio::test]
async fn extra_classification_rules_apply_at_checkout() {
    let cable = refurb_storefront::store::CatalogProduct {
        category_slug: Some("cables".into()),
        ..product("USB-C Cable", 250, 10)
    };

    let h = Harness::new(vec![cable.clone()]);
    let err = h
        .service
        .place_order(Some(&customer()), request(vec![line(&cable, 3.0)]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "USB-C Cable supports quantity 1 only");

    let h = Harness::new(vec![cable.clone()]);
    let service = h
        .service
        .with_resolver(PurchaseModeResolver::default().with_rule(cables_are_multi_unit));
    let outcome = service
        .place_order(Some(&customer()), request(vec![line(&cable, 3.0)]))
        .await
        .unwrap();
    assert_eq!(outcome.items[0].quantity, 3);
    assert_eq!(h.catalog.stock_of(cable.id), Some(7));
}
