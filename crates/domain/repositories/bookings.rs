use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::{
        bookings::{BookingEntity, InsertBookingEntity},
        visits::InsertVisitEntity,
    },
    value_objects::memberships::CreditBalance,
};

#[automock]
#[async_trait]
pub trait BookingRepository {
    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>>;

    /// A confirmed booking that blocks a new one: a class that has not ended yet, or a
    /// direct visit created after `visit_window_start`.
    async fn find_blocking_booking(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
        visit_window_start: DateTime<Utc>,
    ) -> Result<Option<BookingEntity>>;

    /// Inserts the booking and its visit record in one transaction.
    async fn create_with_visit(
        &self,
        booking: InsertBookingEntity,
        visit: InsertVisitEntity,
    ) -> Result<BookingEntity>;

    /// Deletes a confirmed booking, marks its visit cancelled and gives `amount` credits back
    /// to the membership (usage floored at zero), all in one transaction. `None` when no
    /// confirmed booking was deleted.
    async fn cancel_and_refund(
        &self,
        booking_id: Uuid,
        membership_id: Uuid,
        amount: i32,
    ) -> Result<Option<CreditBalance>>;

    /// `confirmed -> completed` compare-and-set. `None` when the booking was not confirmed.
    async fn mark_completed(
        &self,
        booking_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<BookingEntity>>;

    async fn list_by_member(&self, member_id: Uuid) -> Result<Vec<BookingEntity>>;
}
