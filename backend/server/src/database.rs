//! # Redis
//!
//! Document store for orders.
//!
//! Core purpose is to persist one JSON document per order and hand out
//! monotonically increasing order ids.
//!
//! ## Requirements
//!
//! - One record per customer submission
//! - O(1) lookups by id for the customer app
//! - Full listing for the pharmacy dashboard, small dataset per pharmacy
//!
//! ## Implementation
//!
//! - Redis hash: 1 big key `orders`, then id -> JSON document pairs
//! - Id counter: `orders:next_id`, atomic `INCR`
//! - Documents are the flattened order payload plus `id`, `orderStatus`,
//!   `paymentStatus` and `orderDate`
//! - Status changes are compare-and-set: a Lua script only writes the new
//!   document if the stored one is still the one the change was checked
//!   against, otherwise the change is re-read and retried
//!
//! An in-memory store with the same contract backs tests and local runs
//! (`ORDER_STORE=memory`).
use std::{
    collections::BTreeMap,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::orders::{Order, OrderError, OrderId};

pub const ORDERS_KEY: &str = "orders";
pub const NEXT_ID_KEY: &str = "orders:next_id";

const UPDATE_ATTEMPTS: usize = 8;

// KEYS[1] hash, ARGV[1] field, ARGV[2] expected document, ARGV[3] new document
const COMPARE_AND_SET: &str = r#"
    if redis.call('HGET', KEYS[1], ARGV[1]) ~= ARGV[2] then
        return 0
    end
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
    return 1
"#;

/// Checks and applies a change to one order. Must not have side effects,
/// it may run more than once.
pub type Mutation<'a> = &'a (dyn Fn(&mut Order) -> Result<(), OrderError> + Send + Sync);

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order {0} already exists")]
    Duplicate(OrderId),

    #[error("Order {0} kept changing, gave up updating")]
    Contended(OrderId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown order store '{other}'")),
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn next_id(&self) -> Result<OrderId, PersistenceError>;

    async fn insert(&self, order: &Order) -> Result<(), PersistenceError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, PersistenceError>;

    /// Ascending by id.
    async fn list(&self) -> Result<Vec<Order>, PersistenceError>;

    /// Read, check and write one order atomically. Returns the stored result.
    async fn update(&self, id: OrderId, mutate: Mutation<'_>) -> Result<Order, OrderError>;
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, PersistenceError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    compare_and_set: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            compare_and_set: Script::new(COMPARE_AND_SET),
        }
    }
}

#[async_trait]
impl OrderStore for RedisStore {
    async fn next_id(&self) -> Result<OrderId, PersistenceError> {
        let mut connection = self.connection.clone();
        let id: u64 = connection.incr(NEXT_ID_KEY, 1).await?;

        Ok(OrderId(id))
    }

    async fn insert(&self, order: &Order) -> Result<(), PersistenceError> {
        let document = serde_json::to_string(order)?;
        let mut connection = self.connection.clone();

        let created: bool = connection.hset_nx(ORDERS_KEY, order.id.0, document).await?;
        if !created {
            return Err(PersistenceError::Duplicate(order.id));
        }

        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, PersistenceError> {
        let mut connection = self.connection.clone();
        let document: Option<String> = connection.hget(ORDERS_KEY, id.0).await?;

        Ok(document
            .map(|document| serde_json::from_str(&document))
            .transpose()?)
    }

    async fn list(&self) -> Result<Vec<Order>, PersistenceError> {
        let mut connection = self.connection.clone();
        let documents: Vec<String> = connection.hvals(ORDERS_KEY).await?;

        let mut orders = documents
            .iter()
            .map(|document| serde_json::from_str::<Order>(document))
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort_by_key(|order| order.id);

        Ok(orders)
    }

    async fn update(&self, id: OrderId, mutate: Mutation<'_>) -> Result<Order, OrderError> {
        let mut connection = self.connection.clone();

        for _ in 0..UPDATE_ATTEMPTS {
            let current: Option<String> = connection
                .hget(ORDERS_KEY, id.0)
                .await
                .map_err(PersistenceError::from)?;
            let current = current.ok_or(OrderError::NotFound(id))?;

            let mut order: Order =
                serde_json::from_str(&current).map_err(PersistenceError::from)?;
            mutate(&mut order)?;
            let document = serde_json::to_string(&order).map_err(PersistenceError::from)?;

            let swapped: bool = self
                .compare_and_set
                .key(ORDERS_KEY)
                .arg(id.0)
                .arg(&current)
                .arg(&document)
                .invoke_async(&mut connection)
                .await
                .map_err(PersistenceError::from)?;

            if swapped {
                return Ok(order);
            }

            debug!("{id} changed while updating, retrying");
        }

        Err(PersistenceError::Contended(id).into())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    orders: RwLock<BTreeMap<OrderId, Order>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn next_id(&self) -> Result<OrderId, PersistenceError> {
        Ok(OrderId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1))
    }

    async fn insert(&self, order: &Order) -> Result<(), PersistenceError> {
        let mut orders = self.orders.write().await;

        if orders.contains_key(&order.id) {
            return Err(PersistenceError::Duplicate(order.id));
        }
        orders.insert(order.id, order.clone());

        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, PersistenceError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>, PersistenceError> {
        Ok(self.orders.read().await.values().cloned().collect())
    }

    async fn update(&self, id: OrderId, mutate: Mutation<'_>) -> Result<Order, OrderError> {
        let mut orders = self.orders.write().await;
        let stored = orders.get_mut(&id).ok_or(OrderError::NotFound(id))?;

        let mut order = stored.clone();
        mutate(&mut order)?;
        *stored = order.clone();

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::orders::{OrderStatus, PaymentStatus};

    fn order(id: u64) -> Order {
        Order {
            id: OrderId(id),
            payload: json!({"items": ["paracetamol"]})
                .as_object()
                .cloned()
                .unwrap(),
            order_status: OrderStatus::Placed,
            payment_status: PaymentStatus::Pending,
            order_date: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("redis".parse(), Ok(StoreBackend::Redis));
        assert_eq!("memory".parse(), Ok(StoreBackend::Memory));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[tokio::test]
    async fn test_memory_ids_increase() {
        let store = MemoryStore::new();

        assert_eq!(store.next_id().await.unwrap(), OrderId(1));
        assert_eq!(store.next_id().await.unwrap(), OrderId(2));
    }

    #[tokio::test]
    async fn test_memory_insert_get_list() {
        let store = MemoryStore::new();
        store.insert(&order(2)).await.unwrap();
        store.insert(&order(1)).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(OrderId(2)).await.unwrap().unwrap().id, OrderId(2));
        assert!(store.get(OrderId(9)).await.unwrap().is_none());

        let ids: Vec<OrderId> = store.list().await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId(1), OrderId(2)]);
    }

    #[tokio::test]
    async fn test_memory_insert_rejects_duplicate_id() {
        let store = MemoryStore::new();
        store.insert(&order(1)).await.unwrap();

        assert!(matches!(
            store.insert(&order(1)).await,
            Err(PersistenceError::Duplicate(OrderId(1)))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_update() {
        let store = MemoryStore::new();
        store.insert(&order(1)).await.unwrap();

        let updated = store
            .update(OrderId(1), &|order: &mut Order| {
                order.order_status = OrderStatus::Confirmed;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(updated.order_status, OrderStatus::Confirmed);
        assert_eq!(store.get(OrderId(1)).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_memory_update_rejected_leaves_order() {
        let store = MemoryStore::new();
        let original = order(1);
        store.insert(&original).await.unwrap();

        let result = store
            .update(OrderId(1), &|order: &mut Order| {
                order.payment_status = PaymentStatus::Completed;
                Err(OrderError::Validation("no".into()))
            })
            .await;

        assert!(matches!(result, Err(OrderError::Validation(_))));
        assert_eq!(store.get(OrderId(1)).await.unwrap().unwrap(), original);
    }

    #[tokio::test]
    async fn test_memory_update_missing() {
        let store = MemoryStore::new();

        let result = store.update(OrderId(5), &|_: &mut Order| Ok(())).await;

        assert!(matches!(result, Err(OrderError::NotFound(OrderId(5)))));
    }
}
