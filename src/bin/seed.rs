use refurb_storefront::{
    config::AppConfig,
    db::{create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    seed_categories(&pool).await?;
    seed_products(&pool).await?;

    println!("Seed completed");
    Ok(())
}

async fn seed_categories(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = [
        ("phones", "Phones", Some("Refurbished Phones")),
        ("laptops", "Laptops", Some("Refurbished Laptops")),
        ("smart-watches", "Smart Watches", None),
        ("accessories", "Accessories", Some("Chargers, Cases & Cables")),
        ("airpods", "AirPods", None),
    ];

    for (slug, name, display_name) in categories {
        sqlx::query(
            r#"
            INSERT INTO categories (id, slug, name, display_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .bind(name)
        .bind(display_name)
        .execute(pool)
        .await?;
    }

    println!("Seeded categories");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (title, sku, price, stock, category slug, explicit mode)
    let products = [
        ("iPhone 13 128GB (Grade A)", "RF-IP13-128-A", 38_999_i64, 4, "phones", None),
        ("Pixel 7 128GB (Grade B)", "RF-PX7-128-B", 24_499, 2, "phones", None),
        ("MacBook Air M1 8/256", "RF-MBA-M1-256", 54_990, 1, "laptops", None),
        ("Apple Watch Series 7 45mm", "RF-AW7-45", 17_999, 3, "smart-watches", None),
        ("20W USB-C Charger", "AC-USBC-20W", 999, 120, "accessories", None),
        ("MagSafe Silicone Case", "AC-MS-CASE", 1_499, 60, "accessories", None),
        ("AirPods Pro (2nd gen)", "RF-APP2", 14_999, 15, "airpods", None),
        ("Lightning Cable 1m", "AC-LTN-1M", 499, 200, "phones", Some("multi_unit")),
    ];

    for (title, sku, price, stock, slug, mode) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, title, sku, price, stock, purchase_mode, category_id, category_slug)
            SELECT $1, $2, $3, $4, $5, $6, c.id, c.slug
            FROM categories c
            WHERE c.slug = $7
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(sku)
        .bind(price)
        .bind(stock)
        .bind(mode)
        .bind(slug)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
