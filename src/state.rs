use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    middleware::auth::AuthKeys,
    services::{address_service::AddressBook, order_service::OrderService},
    store::PgStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub auth: AuthKeys,
    pub orders: Arc<OrderService>,
    pub addresses: AddressBook,
}

impl AppState {
    /// Wires the Postgres adapter into every port.
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let orm = orm_from_pool(&pool);
        let store = Arc::new(PgStore::new(pool.clone(), orm.clone()));

        let addresses = AddressBook::new(store.clone());
        let orders = OrderService::new(store.clone(), store, addresses.clone(), config.pricing);

        Self {
            auth: AuthKeys::from_secret(&config.jwt_secret),
            pool,
            orm,
            config: Arc::new(config),
            orders: Arc::new(orders),
            addresses,
        }
    }
}

impl FromRef<AppState> for AuthKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
