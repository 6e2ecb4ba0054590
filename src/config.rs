use std::env;

use crate::pricing::PricingPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub pricing: PricingPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: env_i64("FREE_SHIPPING_THRESHOLD")
                .unwrap_or(defaults.free_shipping_threshold),
            flat_shipping_fee: env_i64("FLAT_SHIPPING_FEE").unwrap_or(defaults.flat_shipping_fee),
            tax_rate_percent: env_i64("TAX_RATE_PERCENT").unwrap_or(defaults.tax_rate_percent),
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            pricing,
        })
    }
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
}
