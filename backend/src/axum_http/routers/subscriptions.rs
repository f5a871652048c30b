use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::{
    repositories::{memberships::MembershipRepository, plans::PlanRepository},
    value_objects::{
        memberships::{MembershipDto, PlanChangeRequest},
        plans::PlanDto,
        reconciliation::{PlanChangeOutcome, SyncOutcome},
    },
};
use serde::Serialize;
use tracing::{error, info};

use crate::{auth::AuthUser, usecases::errors::MembershipError, wiring::CoreServices};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(services: Arc<CoreServices>) -> Router {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/current", get(current_membership))
        .route("/start", post(start))
        .route("/cancel", post(cancel))
        .route("/plan-change", post(change_plan))
        .route("/sync", post(sync))
        .route("/webhook", post(stripe_webhook))
        .with_state(services)
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: Option<SyncOutcome>,
}

pub async fn list_plans(
    State(services): State<Arc<CoreServices>>,
    _auth: AuthUser,
) -> Result<Json<Vec<PlanDto>>, MembershipError> {
    let plans = services.plan_repo.list_active_plans().await.map_err(|err| {
        error!(db_error = ?err, "subscriptions: failed to list plans");
        MembershipError::Internal(err)
    })?;

    Ok(Json(plans.into_iter().map(PlanDto::from).collect()))
}

pub async fn current_membership(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<Json<MembershipDto>, MembershipError> {
    let member_id = auth.user_id;
    let membership = services
        .membership_repo
        .find_latest_by_member(member_id)
        .await
        .map_err(|err| {
            error!(%member_id, db_error = ?err, "subscriptions: failed to load membership");
            MembershipError::Internal(err)
        })?
        .ok_or(MembershipError::NotFound("membership"))?;

    Ok(Json(MembershipDto::from(membership)))
}

pub async fn start(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<Json<SyncOutcome>, MembershipError> {
    let outcome = services.reconciler.start_subscription(auth.user_id).await?;
    Ok(Json(outcome))
}

pub async fn cancel(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<StatusCode, MembershipError> {
    services.reconciler.cancel_subscription(auth.user_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn change_plan(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Json(request): Json<PlanChangeRequest>,
) -> Result<Json<PlanChangeOutcome>, MembershipError> {
    let outcome = services
        .reconciler
        .schedule_plan_change(auth.user_id, request.plan_id)
        .await?;
    Ok(Json(outcome))
}

/// Pulls the member's subscription from the provider, e.g. after returning from checkout.
pub async fn sync(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<Json<SyncOutcome>, MembershipError> {
    let outcome = services.reconciler.sync_one(auth.user_id).await?;
    Ok(Json(outcome))
}

pub async fn stripe_webhook(
    State(services): State<Arc<CoreServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, MembershipError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| MembershipError::InvalidWebhook("missing signature header".to_string()))?;

    let outcome = services
        .reconciler
        .handle_stripe_webhook(&body, signature)
        .await?;
    info!(synced = outcome.is_some(), "subscriptions: webhook processed");

    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}
