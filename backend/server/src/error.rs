use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::orders::OrderError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::Order(OrderError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Order(OrderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Order(OrderError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            AppError::Order(OrderError::Persistence(e)) => {
                error!("Persistence failure: {e}");

                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error: order store unavailable",
                )
                    .into_response();
            }
        };

        (status, self.to_string()).into_response()
    }
}
