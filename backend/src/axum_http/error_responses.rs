use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::usecases::errors::MembershipError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for MembershipError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            MembershipError::Internal(err) => {
                error!(error = ?err, "http: internal error");
                // Don't leak internal error detail to client
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: self.code(),
            message,
        });

        (status, body).into_response()
    }
}

/// Plain rejection for callers lacking the role a route needs.
pub fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            code: "forbidden",
            message: "service role required".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: MembershipError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn business_error_carries_code_and_message() {
        let (status, body) = render(MembershipError::InsufficientCredits {
            requested: 2,
            remaining: 1,
        })
        .await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "insufficient_credits");
        assert!(body["message"].as_str().unwrap().contains("remaining 1"));
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let (status, body) =
            render(MembershipError::Internal(anyhow::anyhow!("password=hunter2"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "internal");
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn slot_limit_is_a_conflict() {
        let (status, body) = render(MembershipError::SlotLimitExceeded { max_slots: 3 }).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "slot_limit_exceeded");
    }
}
