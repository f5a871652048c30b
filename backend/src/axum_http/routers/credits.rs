use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::value_objects::memberships::{CreditAmountRequest, CreditBalance};
use uuid::Uuid;

use crate::{
    auth::AuthUser, axum_http::error_responses::forbidden, usecases::errors::MembershipError,
    wiring::CoreServices,
};

pub fn routes(services: Arc<CoreServices>) -> Router {
    Router::new()
        .route("/", get(balance))
        .route("/:member_id/charge", post(charge))
        .route("/:member_id/refund", post(refund))
        .with_state(services)
}

pub async fn balance(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<Json<CreditBalance>, MembershipError> {
    let balance = services.ledger.balance(auth.user_id).await?;
    Ok(Json(balance))
}

/// Manual adjustments are staff-only; members spend credits through bookings.
pub async fn charge(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Path(member_id): Path<Uuid>,
    Json(request): Json<CreditAmountRequest>,
) -> Response {
    if !auth.is_service_role() {
        return forbidden();
    }

    match services.ledger.charge(member_id, request.amount).await {
        Ok(balance) => Json(balance).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn refund(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Path(member_id): Path<Uuid>,
    Json(request): Json<CreditAmountRequest>,
) -> Response {
    if !auth.is_service_role() {
        return forbidden();
    }

    match services.ledger.refund(member_id, request.amount).await {
        Ok(balance) => Json(balance).into_response(),
        Err(err) => err.into_response(),
    }
}
