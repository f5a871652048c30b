use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::bookings::BookingEntity;

/// Direct visits can be checked into for this long after booking.
pub const DIRECT_VISIT_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingDto {
    pub id: Uuid,
    pub gym_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub credits_used: i32,
    pub status: String,
    pub check_in_code: String,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<BookingEntity> for BookingDto {
    fn from(value: BookingEntity) -> Self {
        Self {
            id: value.id,
            gym_id: value.gym_id,
            class_id: value.class_id,
            credits_used: value.credits_used,
            status: value.status,
            check_in_code: value.check_in_code,
            valid_until: value.valid_until,
            created_at: value.created_at,
            completed_at: value.completed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DirectVisitRequest {
    pub gym_id: Uuid,
    pub credits_to_use: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ClassBookingRequest {
    pub class_id: Uuid,
}
