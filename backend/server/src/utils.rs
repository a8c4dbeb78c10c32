use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected body: {e}");
        AppError::MalformedPayload
    })
}
