use std::fs;

use refurb_storefront::{
    cart::{CART_STORAGE_KEY, CartStore, FileStorage, NewCartItem},
    purchase_mode::PurchaseMode,
};
use serde_json::{Value, json};

#[test]
fn cart_survives_a_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let mut cart = CartStore::load(FileStorage::new(dir.path()));
    cart.add_item(
        NewCartItem::new("case1", "Silicone Case", 499)
            .mode(PurchaseMode::MultiUnit)
            .max_quantity(10)
            .quantity(3),
    );
    cart.add_item(
        NewCartItem::new("case1", "Silicone Case", 499)
            .mode(PurchaseMode::MultiUnit)
            .max_quantity(10)
            .quantity(3),
    );
    cart.add_item(NewCartItem::new("phone1", "Pixel 7", 24_000).mode(PurchaseMode::SingleUnit));
    assert!(cart.is_open());

    let reloaded = CartStore::load(FileStorage::new(dir.path()));
    assert!(!reloaded.is_open());
    assert_eq!(reloaded.items(), cart.items());
    assert_eq!(reloaded.item_count(), 7);
    assert_eq!(reloaded.subtotal(), 6 * 499 + 24_000);

    let path = dir.path().join(format!("{CART_STORAGE_KEY}.json"));
    let stored: Vec<Value> = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert_eq!(stored[0]["maxQuantity"], 10);
    assert_eq!(stored[1]["purchaseMode"], "single_unit");
}

#[test]
fn tampered_file_is_renormalized_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let records = json!([
        { "id": "watch1", "name": "Galaxy Watch", "price": 9000, "quantity": 4, "purchaseMode": "single_unit" },
        { "id": "case1", "name": "Case", "price": "299", "quantity": 50, "maxQuantity": 5, "purchaseMode": "multi_unit" },
        { "name": "no id" },
        { "id": "phone1", "name": "Pixel 7", "price": 24000, "isSingleUnit": true },
    ]);
    fs::write(
        dir.path().join(format!("{CART_STORAGE_KEY}.json")),
        serde_json::to_vec(&records).unwrap(),
    )
    .unwrap();

    let cart = CartStore::load(FileStorage::new(dir.path()));
    let summary: Vec<(&str, i64, i64)> = cart
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item.quantity, item.max_quantity))
        .collect();
    assert_eq!(summary, vec![("case1", 5, 5), ("phone1", 1, 1)]);
}

#[test]
fn garbage_file_starts_an_empty_cart() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(format!("{CART_STORAGE_KEY}.json")), b"{not json").unwrap();

    let mut cart = CartStore::load(FileStorage::new(dir.path()));
    assert!(cart.items().is_empty());

    cart.add_item(NewCartItem::new("case1", "Case", 299).mode(PurchaseMode::MultiUnit).stock(2));
    cart.clear_cart();
    let reloaded = CartStore::load(FileStorage::new(dir.path()));
    assert!(reloaded.items().is_empty());
}
