use std::sync::Arc;

use tracing::info;

use super::{
    config::Config,
    database::{MemoryStore, OrderStore, PersistenceError, RedisStore, StoreBackend, init_redis},
    orders::OrderService,
};

pub struct State {
    pub config: Config,
    pub orders: OrderService,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, PersistenceError> {
        let store: Arc<dyn OrderStore> = match config.order_store {
            StoreBackend::Redis => {
                info!("Connecting to Redis...");
                Arc::new(RedisStore::new(init_redis(&config.redis_url).await?))
            }
            StoreBackend::Memory => {
                info!("Using in-memory order store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn OrderStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            orders: OrderService::new(store),
        })
    }
}
