use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    RunQueryDsl, define_sql_function, prelude::*, sql_types::Integer, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::memberships};
use domain::{
    entities::memberships::{MembershipEntity, MembershipRow, ScheduledChangeColumns},
    repositories::memberships::MembershipRepository,
    value_objects::memberships::{CreditBalance, PeriodRoll, ScheduledChange},
};

define_sql_function!(fn greatest(a: Integer, b: Integer) -> Integer);
define_sql_function!(fn least(a: Integer, b: Integer) -> Integer);

pub struct MembershipPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl MembershipPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MembershipRepository for MembershipPostgres {
    async fn find_active_by_member(&self, member_id: Uuid) -> Result<Option<MembershipEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = memberships::table
            .filter(memberships::member_id.eq(member_id))
            .filter(memberships::is_active.eq(true))
            .select(MembershipRow::as_select())
            .first::<MembershipRow>(&mut conn)
            .optional()?;

        Ok(row.map(MembershipEntity::from))
    }

    async fn find_latest_by_member(&self, member_id: Uuid) -> Result<Option<MembershipEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = memberships::table
            .filter(memberships::member_id.eq(member_id))
            .order((memberships::is_active.desc(), memberships::created_at.desc()))
            .select(MembershipRow::as_select())
            .first::<MembershipRow>(&mut conn)
            .optional()?;

        Ok(row.map(MembershipEntity::from))
    }

    async fn find_by_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<MembershipEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = memberships::table
            .filter(memberships::stripe_subscription_id.eq(stripe_subscription_id))
            .order(memberships::created_at.desc())
            .select(MembershipRow::as_select())
            .first::<MembershipRow>(&mut conn)
            .optional()?;

        Ok(row.map(MembershipEntity::from))
    }

    async fn list_members_with_subscription(&self) -> Result<Vec<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let member_ids = memberships::table
            .filter(memberships::stripe_subscription_id.is_not_null())
            .select(memberships::member_id)
            .distinct()
            .load::<Uuid>(&mut conn)?;

        Ok(member_ids)
    }

    async fn try_consume_credits(
        &self,
        membership_id: Uuid,
        amount: i32,
    ) -> Result<Option<CreditBalance>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Single statement compare-and-set: concurrent writers cannot both pass the guard.
        let counters = update(memberships::table)
            .filter(memberships::id.eq(membership_id))
            .filter(memberships::is_active.eq(true))
            .filter((memberships::credits_used + amount).le(memberships::credits))
            .set((
                memberships::credits_used.eq(memberships::credits_used + amount),
                memberships::updated_at.eq(Utc::now()),
            ))
            .returning((memberships::credits, memberships::credits_used))
            .get_result::<(i32, i32)>(&mut conn)
            .optional()?;

        Ok(counters.map(|(credits, used)| CreditBalance::from_counters(credits, used)))
    }

    async fn release_credits(&self, membership_id: Uuid, amount: i32) -> Result<CreditBalance> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let (credits, used) = update(memberships::table.find(membership_id))
            .set((
                memberships::credits_used.eq(greatest(memberships::credits_used - amount, 0)),
                memberships::updated_at.eq(Utc::now()),
            ))
            .returning((memberships::credits, memberships::credits_used))
            .get_result::<(i32, i32)>(&mut conn)?;

        Ok(CreditBalance::from_counters(credits, used))
    }

    async fn reset_credits(&self, membership_id: Uuid, credits: i32) -> Result<CreditBalance> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let (credits, used) = update(memberships::table.find(membership_id))
            .set((
                memberships::credits.eq(credits),
                memberships::credits_used.eq(0),
                memberships::updated_at.eq(Utc::now()),
            ))
            .returning((memberships::credits, memberships::credits_used))
            .get_result::<(i32, i32)>(&mut conn)?;

        Ok(CreditBalance::from_counters(credits, used))
    }

    async fn reallocate_credits(
        &self,
        membership_id: Uuid,
        credits: i32,
    ) -> Result<CreditBalance> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let (credits, used) = update(memberships::table.find(membership_id))
            .set((
                memberships::credits.eq(credits),
                memberships::credits_used.eq(least(memberships::credits_used, credits)),
                memberships::updated_at.eq(Utc::now()),
            ))
            .returning((memberships::credits, memberships::credits_used))
            .get_result::<(i32, i32)>(&mut conn)?;

        Ok(CreditBalance::from_counters(credits, used))
    }

    async fn update_stripe_status(&self, membership_id: Uuid, stripe_status: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(memberships::table.find(membership_id))
            .set((
                memberships::stripe_status.eq(Some(stripe_status)),
                memberships::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_subscription_ref(
        &self,
        membership_id: Uuid,
        stripe_subscription_id: &str,
        stripe_status: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(memberships::table.find(membership_id))
            .set((
                memberships::stripe_subscription_id.eq(Some(stripe_subscription_id)),
                memberships::stripe_status.eq(Some(stripe_status)),
                memberships::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn roll_period(&self, membership_id: Uuid, roll: PeriodRoll) -> Result<CreditBalance> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let (credits, used) = conn.transaction::<_, diesel::result::Error, _>(|tx| {
            if let Some((plan_id, plan_title)) = roll.plan.as_ref() {
                update(memberships::table.find(membership_id))
                    .set((
                        memberships::plan_id.eq(*plan_id),
                        memberships::plan_title.eq(plan_title),
                        &ScheduledChangeColumns::default(),
                    ))
                    .execute(tx)?;
            }

            update(memberships::table.find(membership_id))
                .set((
                    memberships::start_date.eq(roll.start_date),
                    memberships::end_date.eq(roll.end_date),
                    memberships::credits.eq(roll.credits),
                    memberships::credits_used.eq(0),
                    memberships::updated_at.eq(now),
                ))
                .returning((memberships::credits, memberships::credits_used))
                .get_result::<(i32, i32)>(tx)
        })?;

        Ok(CreditBalance::from_counters(credits, used))
    }

    async fn activate(&self, membership_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        conn.transaction::<(), diesel::result::Error, _>(|tx| {
            let member_id = memberships::table
                .find(membership_id)
                .select(memberships::member_id)
                .for_update()
                .first::<Uuid>(tx)?;

            // Keeps the one-active-membership-per-member index satisfied.
            update(memberships::table)
                .filter(memberships::member_id.eq(member_id))
                .filter(memberships::id.ne(membership_id))
                .filter(memberships::is_active.eq(true))
                .set((
                    memberships::is_active.eq(false),
                    memberships::updated_at.eq(now),
                ))
                .execute(tx)?;

            update(memberships::table.find(membership_id))
                .set((
                    memberships::is_active.eq(true),
                    memberships::updated_at.eq(now),
                ))
                .execute(tx)?;

            Ok(())
        })?;

        Ok(())
    }

    async fn deactivate(&self, membership_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(memberships::table.find(membership_id))
            .set((
                memberships::is_active.eq(false),
                memberships::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn assign_plan(
        &self,
        membership_id: Uuid,
        plan_id: Uuid,
        plan_title: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(memberships::table.find(membership_id))
            .set((
                memberships::plan_id.eq(plan_id),
                memberships::plan_title.eq(plan_title),
                memberships::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn save_scheduled_change(
        &self,
        membership_id: Uuid,
        change: Option<ScheduledChange>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let columns = ScheduledChangeColumns::from(change.as_ref());

        update(memberships::table.find(membership_id))
            .set((&columns, memberships::updated_at.eq(Utc::now())))
            .execute(&mut conn)?;

        Ok(())
    }
}
