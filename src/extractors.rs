use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// JSON body whose rejection is a `Validation` error in the envelope.
///
/// The body is decoded whatever the `Content-Type` header says.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            debug!(error = %e, "failed to read request body");
            AppError::validation("invalid request body")
        })?;
        let value = serde_json::from_slice::<T>(&bytes).map_err(|e| {
            debug!(error = %e, "rejected request body");
            AppError::validation("invalid request body")
        })?;
        Ok(JsonBody(value))
    }
}

/// Numeric `:id` path segment.
pub struct AccountIdPath(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AccountIdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::validation("invalid id format"))?;
        raw.parse::<i64>()
            .map(AccountIdPath)
            .map_err(|_| AppError::validation("invalid id format"))
    }
}
