//! Documentation of the MediGo medicine delivery backend.
//!
//!
//!
//! # General Infrastructure
//! - Expo app (customer and pharmacy route groups) talks to this server over JSON
//! - Server owns order creation and order/payment status changes
//! - Orders live in Redis as JSON documents, see [`database`]
//! - Prescription photos live in Backblaze B2, the server only hands out download URLs, see [`storage`]
//!
//!
//!
//! # Environments
//!
//! `NODE_ENV` picks one of `development`, `production`, `test`. Anything else quietly becomes
//! `development` with a warning in the logs, so double check the variable on production hosts.
//!
//! | environment | backend                  | frontend                |
//! |-------------|--------------------------|-------------------------|
//! | development | `http://localhost:8082`  | `http://localhost:8081` |
//! | production  | `https://api.medigo.app` | `https://medigo.app`    |
//! | test        | `http://127.0.0.1:8082`  | `http://127.0.0.1:8081` |
//!
//! `BACKEND_API_URL` and `FRONTEND_URL` override the table. CORS only lets the frontend origin through.
//!
//!
//!
//! # Routes
//!
//! Customer
//! - `POST /orders` with `{ "order": {...}, "paymentOutcome": "succeeded" | "failed" | "pending" }`
//! - `GET /orders/{id}`
//!
//! Pharmacy
//! - `GET /pharmacy/orders`
//! - `PATCH /pharmacy/orders/{id}/status` with `{ "orderStatus": "confirmed" }`
//! - `PATCH /pharmacy/orders/{id}/payment` with `{ "paymentStatus": "completed" }`
//!
//! Shared
//! - `GET /config`, public client configuration, no secrets
//!
//!
//!
//! # Notes
//!
//! ## One order per checkout
//! The old Express controller inserted three documents per checkout (pending, completed, pending)
//! no matter what the payment did. Now exactly one document is written and `paymentStatus` follows
//! the payment outcome sent with the checkout: `succeeded` gives `completed`, anything else `pending`.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! RUST_LOG=info cargo run --bin medigo
//! ```
//!
//! Run without Redis.
//! ```sh
//! ORDER_STORE=memory RUST_LOG=info cargo run --bin medigo
//! ```
//!
//! Submit a sample order.
//! ```sh
//! cargo run --bin tester -- --payment failed
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod client;
pub mod config;
pub mod database;
pub mod environment;
pub mod error;
pub mod orders;
pub mod routes;
pub mod state;
pub mod storage;
pub mod utils;

use config::Config;
use routes::{
    config_handler, get_order_handler, list_orders_handler, payment_handler,
    place_order_handler, status_handler,
};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load().context("Environment misconfigured!")?;
    info!("Environment: {}", config.environment);

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let app = app(state.clone())?;

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn app(state: Arc<State>) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;

    let customer: Router<Arc<State>> = Router::new()
        .route("/orders", post(place_order_handler))
        .route("/orders/{id}", get(get_order_handler));

    let pharmacy: Router<Arc<State>> = Router::new()
        .route("/orders", get(list_orders_handler))
        .route("/orders/{id}/status", patch(status_handler))
        .route("/orders/{id}/payment", patch(payment_handler));

    Ok(Router::new()
        .merge(customer)
        .nest("/pharmacy", pharmacy)
        .route("/config", get(config_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origin = config.frontend_origin();
    let origin = HeaderValue::from_str(&origin)
        .with_context(|| format!("Frontend origin {origin} is not a valid header"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
