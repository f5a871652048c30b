use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use crates::domain::value_objects::gym_slots::{GymSelectionRequest, GymSelections};
use uuid::Uuid;

use crate::{auth::AuthUser, usecases::errors::MembershipError, wiring::CoreServices};

pub fn routes(services: Arc<CoreServices>) -> Router {
    Router::new()
        .route("/", get(list).post(add))
        .route("/:gym_id", delete(remove))
        .with_state(services)
}

pub async fn list(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<Json<GymSelections>, MembershipError> {
    let selections = services.scheduler.list_selections(auth.user_id).await?;
    Ok(Json(selections))
}

pub async fn add(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Json(request): Json<GymSelectionRequest>,
) -> Result<impl IntoResponse, MembershipError> {
    let selection = services
        .scheduler
        .add_gym(auth.user_id, request.gym_id)
        .await?;
    Ok((StatusCode::CREATED, Json(selection)))
}

pub async fn remove(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Path(gym_id): Path<Uuid>,
) -> Result<StatusCode, MembershipError> {
    services.scheduler.remove_gym(auth.user_id, gym_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
