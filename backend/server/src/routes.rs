use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    environment::Environment,
    error::AppError,
    orders::{OrderId, OrderStatus, OrderSubmission, PaymentStatus},
    state::State,
    utils::decode_body,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    order_status: OrderStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    payment_status: PaymentStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    environment: Environment,
    backend_api_url: String,
    frontend_url: String,
    storage_download_url: String,
}

pub async fn place_order_handler(
    AxumState(state): AxumState<Arc<State>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let submission: OrderSubmission = decode_body(&body)?;
    let order = state.orders.place_order(submission).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orders.get_order(OrderId(id)).await?))
}

pub async fn list_orders_handler(
    AxumState(state): AxumState<Arc<State>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orders.list_orders().await?))
}

pub async fn status_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let update: StatusUpdate = decode_body(&body)?;
    let order = state
        .orders
        .update_status(OrderId(id), update.order_status)
        .await?;

    Ok(Json(order))
}

pub async fn payment_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let update: PaymentUpdate = decode_body(&body)?;
    let order = state
        .orders
        .record_payment(OrderId(id), update.payment_status)
        .await?;

    Ok(Json(order))
}

pub async fn config_handler(AxumState(state): AxumState<Arc<State>>) -> impl IntoResponse {
    let config = &state.config;

    Json(ClientConfig {
        environment: config.environment,
        backend_api_url: config.backend_api_url.to_string(),
        frontend_url: config.frontend_url.to_string(),
        storage_download_url: config.storage.file_url("").to_string(),
    })
}
