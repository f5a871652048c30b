use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::booking_statuses::BookingStatus,
    infra::db::postgres::schema::bookings,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = bookings)]
pub struct BookingEntity {
    pub id: Uuid,
    pub member_id: Uuid,
    pub gym_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub credits_used: i32,
    pub status: String,
    pub check_in_code: String,
    /// Advisory end of the check-in window.
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BookingEntity {
    pub fn booking_status(&self) -> Option<BookingStatus> {
        BookingStatus::from_str(&self.status)
    }

    pub fn is_class_booking(&self) -> bool {
        self.class_id.is_some()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct InsertBookingEntity {
    pub id: Uuid,
    pub member_id: Uuid,
    pub gym_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub credits_used: i32,
    pub status: String,
    pub check_in_code: String,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
