use std::{fmt, sync::Arc};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::database::{OrderStore, PersistenceError};

/// Keys the service owns. Submissions carrying them are rejected.
pub const RESERVED_KEYS: [&str; 4] = ["id", "orderStatus", "paymentStatus", "orderDate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Placed, Confirmed | Cancelled)
                | (Confirmed, OutForDelivery | Cancelled)
                | (OutForDelivery, Delivered)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, next),
            (Pending, Completed | Failed) | (Failed, Completed)
        )
    }
}

/// Result of the payment attempt made while the customer checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    #[default]
    Pending,
}

impl From<PaymentOutcome> for PaymentStatus {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded => Self::Completed,
            PaymentOutcome::Failed | PaymentOutcome::Pending => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub order: Value,
    #[serde(default)]
    pub payment_outcome: PaymentOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_date: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, payload: Map<String, Value>, outcome: PaymentOutcome) -> Self {
        Self {
            id,
            payload,
            order_status: OrderStatus::Placed,
            payment_status: outcome.into(),
            // millisecond precision, same shape as the app's Date.toISOString()
            order_date: Utc::now().trunc_subsecs(3),
        }
    }
}

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Validation(String),

    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Cannot move {what} from {from} to {to}")]
    InvalidTransition {
        what: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub fn validate_payload(payload: Value) -> Result<Map<String, Value>, OrderError> {
    let Value::Object(payload) = payload else {
        return Err(OrderError::Validation("order must be a JSON object".into()));
    };

    if payload.is_empty() {
        return Err(OrderError::Validation("order is empty".into()));
    }

    if let Some(key) = RESERVED_KEYS.iter().find(|key| payload.contains_key(**key)) {
        return Err(OrderError::Validation(format!("{key} is set by the server")));
    }

    match payload.get("items") {
        None => {}
        Some(Value::Array(items)) if !items.is_empty() => {}
        Some(_) => {
            return Err(OrderError::Validation(
                "items must be a non-empty array".into(),
            ));
        }
    }

    match payload.get("total") {
        None => {}
        Some(total) if total.as_f64().is_some_and(|t| t.is_finite() && t >= 0.0) => {}
        Some(_) => {
            return Err(OrderError::Validation(
                "total must be a non-negative number".into(),
            ));
        }
    }

    Ok(payload)
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Persists exactly one record per submission.
    pub async fn place_order(&self, submission: OrderSubmission) -> Result<Order, OrderError> {
        let payload = validate_payload(submission.order)?;

        let id = self.store.next_id().await?;
        let order = Order::new(id, payload, submission.payment_outcome);
        self.store.insert(&order).await?;

        #[cfg(feature = "verbose")]
        tracing::debug!("Stored order document: {order:?}");

        info!(
            "Placed {} with payment {}",
            order.id,
            order.payment_status.as_str()
        );

        Ok(order)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list().await?)
    }

    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let order = self
            .store
            .update(id, &|order: &mut Order| {
                if !order.order_status.can_transition_to(next) {
                    return Err(OrderError::InvalidTransition {
                        what: "order status",
                        from: order.order_status.as_str(),
                        to: next.as_str(),
                    });
                }

                order.order_status = next;
                Ok(())
            })
            .await?;
        info!("{id} is now {}", next.as_str());

        Ok(order)
    }

    pub async fn record_payment(
        &self,
        id: OrderId,
        next: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .update(id, &|order: &mut Order| {
                if !order.payment_status.can_transition_to(next) {
                    return Err(OrderError::InvalidTransition {
                        what: "payment status",
                        from: order.payment_status.as_str(),
                        to: next.as_str(),
                    });
                }

                order.payment_status = next;
                Ok(())
            })
            .await?;
        info!("{id} payment is now {}", next.as_str());

        Ok(order)
    }
}
