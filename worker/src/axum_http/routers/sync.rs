use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::reconciliation::worker::MembershipSync;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/sync" \
//     -H "Authorization: Bearer $INTERNAL_SYNC_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"member_id":"123e4567-e89b-12d3-a456-426614174000"}'

#[derive(Clone)]
pub struct SyncRouteState {
    internal_token: Option<Arc<str>>,
    reconciler: Arc<dyn MembershipSync>,
}

pub fn routes(internal_token: Option<String>, reconciler: Arc<dyn MembershipSync>) -> Router {
    Router::new()
        .route("/", post(trigger_sync))
        .with_state(SyncRouteState {
            internal_token: internal_token.map(Arc::from),
            reconciler,
        })
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// Sync a single member. Every subscribed member when absent.
    pub member_id: Option<Uuid>,
}

pub async fn trigger_sync(
    State(state): State<SyncRouteState>,
    headers: HeaderMap,
    payload: Option<Json<SyncRequest>>,
) -> Response {
    let Some(expected_token) = state.internal_token.as_deref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "sync token is not configured").into_response();
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let Json(request) = payload.unwrap_or_default();
    let result = match request.member_id {
        Some(member_id) => {
            info!(%member_id, "sync: manual member sync requested");
            state
                .reconciler
                .sync_one(member_id)
                .await
                .map(|outcome| Json(outcome).into_response())
        }
        None => {
            info!("sync: manual batch sync requested");
            state
                .reconciler
                .sync_all()
                .await
                .map(|report| Json(report).into_response())
        }
    };

    result.unwrap_or_else(|err| err.into_response())
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn matching_bearer_is_accepted() {
        assert!(authorize_bearer(&headers("Bearer s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn wrong_or_missing_token_is_rejected() {
        assert_eq!(
            authorize_bearer(&headers("Bearer nope"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&headers("s3cret"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&HeaderMap::new(), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
