//! JSON envelope used by every handler:
//! `{"status":"success","data":...}` or `{"status":"error","error":"..."}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

const ENCODE_FAILED: &str = r#"{"status":"error","error":"failed to encode response"}"#;

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    status: &'static str,
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    error: &'a str,
}

/// Successful handler output wrapped in the envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        encode(
            self.status,
            &SuccessBody {
                status: "success",
                data: &self.data,
            },
        )
    }
}

pub fn error_envelope(status: StatusCode, message: &str) -> Response {
    encode(
        status,
        &ErrorBody {
            status: "error",
            error: message,
        },
    )
}

fn encode<B: Serialize>(status: StatusCode, body: &B) -> Response {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!(error = %e, "failed to encode response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ENCODE_FAILED.as_bytes().to_vec(),
            )
        }
    };
    let mut res = (status, bytes).into_response();
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    res
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope() {
        let res = ApiResponse::created(vec![1, 2, 3]).into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("application/json")
        );
        let json = body_json(res).await;
        assert_eq!(json, serde_json::json!({"status": "success", "data": [1, 2, 3]}));
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let json = body_json(error_envelope(StatusCode::NOT_FOUND, "user not found")).await;
        assert_eq!(
            json,
            serde_json::json!({"status": "error", "error": "user not found"})
        );
    }

    #[tokio::test]
    async fn unencodable_payload_is_a_500() {
        // JSON object keys must be strings.
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);
        let res = ApiResponse::ok(bad).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["error"], "failed to encode response");
    }
}
