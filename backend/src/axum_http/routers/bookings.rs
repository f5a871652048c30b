use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::value_objects::bookings::{BookingDto, ClassBookingRequest, DirectVisitRequest};
use uuid::Uuid;

use crate::{auth::AuthUser, usecases::errors::MembershipError, wiring::CoreServices};

pub fn routes(services: Arc<CoreServices>) -> Router {
    Router::new()
        .route("/", get(list))
        .route("/visits", post(book_visit))
        .route("/classes", post(book_class))
        .route("/:booking_id/cancel", post(cancel))
        .route("/:booking_id/complete", post(complete))
        .with_state(services)
}

pub async fn list(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
) -> Result<Json<Vec<BookingDto>>, MembershipError> {
    let bookings = services.bookings.list_bookings(auth.user_id).await?;
    Ok(Json(bookings))
}

pub async fn book_visit(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Json(request): Json<DirectVisitRequest>,
) -> Result<impl IntoResponse, MembershipError> {
    let booking = services
        .bookings
        .book_direct_visit(auth.user_id, request.gym_id, request.credits_to_use)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn book_class(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Json(request): Json<ClassBookingRequest>,
) -> Result<impl IntoResponse, MembershipError> {
    let booking = services
        .bookings
        .book_class(auth.user_id, request.class_id)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Members cancel their own bookings, staff may cancel any.
pub async fn cancel(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, MembershipError> {
    if auth.is_service_role() {
        services.bookings.cancel_booking(booking_id).await?;
    } else {
        services
            .bookings
            .cancel_member_booking(auth.user_id, booking_id)
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete(
    State(services): State<Arc<CoreServices>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingDto>, MembershipError> {
    let booking = if auth.is_service_role() {
        services.bookings.complete_booking(booking_id).await?
    } else {
        services
            .bookings
            .complete_member_booking(auth.user_id, booking_id)
            .await?
    };
    Ok(Json(booking))
}
