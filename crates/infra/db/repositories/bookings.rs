use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    RunQueryDsl, define_sql_function, delete, insert_into, prelude::*, sql_types::Integer, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{bookings, memberships, visits},
};
use domain::{
    entities::{
        bookings::{BookingEntity, InsertBookingEntity},
        visits::InsertVisitEntity,
    },
    repositories::bookings::BookingRepository,
    value_objects::{enums::booking_statuses::BookingStatus, memberships::CreditBalance},
};

define_sql_function!(fn greatest(a: Integer, b: Integer) -> Integer);

pub struct BookingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BookingRepository for BookingPostgres {
    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let booking = bookings::table
            .find(booking_id)
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(booking)
    }

    async fn find_blocking_booking(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
        visit_window_start: DateTime<Utc>,
    ) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let booking = bookings::table
            .filter(bookings::member_id.eq(member_id))
            .filter(bookings::status.eq(BookingStatus::Confirmed.to_string()))
            .filter(
                bookings::class_id
                    .is_not_null()
                    .and(bookings::valid_until.gt(now))
                    .or(bookings::class_id
                        .is_null()
                        .and(bookings::created_at.gt(visit_window_start))),
            )
            .order(bookings::created_at.desc())
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(booking)
    }

    async fn create_with_visit(
        &self,
        booking: InsertBookingEntity,
        visit: InsertVisitEntity,
    ) -> Result<BookingEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = conn.transaction::<BookingEntity, diesel::result::Error, _>(|tx| {
            let created = insert_into(bookings::table)
                .values(&booking)
                .returning(BookingEntity::as_returning())
                .get_result::<BookingEntity>(tx)?;

            insert_into(visits::table).values(&visit).execute(tx)?;

            Ok(created)
        })?;

        Ok(created)
    }

    async fn cancel_and_refund(
        &self,
        booking_id: Uuid,
        membership_id: Uuid,
        amount: i32,
    ) -> Result<Option<CreditBalance>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let refunded = conn.transaction::<(i32, i32), diesel::result::Error, _>(|tx| {
            let deleted = delete(bookings::table)
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::status.eq(BookingStatus::Confirmed.to_string()))
                .execute(tx)?;

            if deleted == 0 {
                return Err(diesel::result::Error::RollbackTransaction);
            }

            update(visits::table)
                .filter(visits::booking_id.eq(booking_id))
                .set(visits::status.eq(BookingStatus::Cancelled.to_string()))
                .execute(tx)?;

            update(memberships::table.find(membership_id))
                .set((
                    memberships::credits_used.eq(greatest(memberships::credits_used - amount, 0)),
                    memberships::updated_at.eq(Utc::now()),
                ))
                .returning((memberships::credits, memberships::credits_used))
                .get_result::<(i32, i32)>(tx)
        });

        match refunded {
            Ok((credits, used)) => Ok(Some(CreditBalance::from_counters(credits, used))),
            Err(diesel::result::Error::RollbackTransaction) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn mark_completed(
        &self,
        booking_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let completed = conn.transaction::<Option<BookingEntity>, diesel::result::Error, _>(
            |tx| {
                let booking = update(bookings::table)
                    .filter(bookings::id.eq(booking_id))
                    .filter(bookings::status.eq(BookingStatus::Confirmed.to_string()))
                    .set((
                        bookings::status.eq(BookingStatus::Completed.to_string()),
                        bookings::completed_at.eq(Some(completed_at)),
                    ))
                    .returning(BookingEntity::as_returning())
                    .get_result::<BookingEntity>(tx)
                    .optional()?;

                if booking.is_some() {
                    update(visits::table)
                        .filter(visits::booking_id.eq(booking_id))
                        .set((
                            visits::status.eq(BookingStatus::Completed.to_string()),
                            visits::visited_at.eq(completed_at),
                        ))
                        .execute(tx)?;
                }

                Ok(booking)
            },
        )?;

        Ok(completed)
    }

    async fn list_by_member(&self, member_id: Uuid) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(bookings::member_id.eq(member_id))
            .order(bookings::created_at.desc())
            .select(BookingEntity::as_select())
            .load::<BookingEntity>(&mut conn)?;

        Ok(rows)
    }
}
