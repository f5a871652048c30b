use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::memberships::{CreditBalance, ScheduledChange},
    infra::db::postgres::schema::memberships,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipEntity {
    pub id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub plan_title: String,
    pub credits: i32,
    pub credits_used: i32,
    pub start_date: DateTime<Utc>,
    /// End of the current billing period, which is also the next billing date.
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_status: Option<String>,
    pub scheduled_change: Option<ScheduledChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipEntity {
    pub fn balance(&self) -> CreditBalance {
        CreditBalance::from_counters(self.credits, self.credits_used)
    }
}

/// Raw row used for Diesel queries. The `scheduled_*` columns are folded into
/// `MembershipEntity::scheduled_change`.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = memberships)]
pub struct MembershipRow {
    pub id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub plan_title: String,
    pub credits: i32,
    pub credits_used: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_status: Option<String>,
    pub scheduled_plan_id: Option<Uuid>,
    pub scheduled_plan_title: Option<String>,
    pub scheduled_credits: Option<i32>,
    pub scheduled_price_id: Option<String>,
    pub scheduled_effective_at: Option<DateTime<Utc>>,
    pub scheduled_confirmed: Option<bool>,
    pub scheduled_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MembershipRow> for MembershipEntity {
    fn from(row: MembershipRow) -> Self {
        let scheduled_change = match (
            row.scheduled_plan_id,
            row.scheduled_credits,
            row.scheduled_effective_at,
        ) {
            (Some(plan_id), Some(credits), Some(effective_at)) => Some(ScheduledChange {
                plan_id,
                plan_title: row.scheduled_plan_title.unwrap_or_default(),
                credits,
                price_id: row.scheduled_price_id,
                effective_at,
                confirmed: row.scheduled_confirmed.unwrap_or(false),
                error: row.scheduled_error,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            member_id: row.member_id,
            plan_id: row.plan_id,
            plan_title: row.plan_title,
            credits: row.credits,
            credits_used: row.credits_used,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_status: row.stripe_status,
            scheduled_change,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Changeset writing (or clearing, when built from `None`) the scheduled plan change.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = memberships, treat_none_as_null = true)]
pub struct ScheduledChangeColumns {
    pub scheduled_plan_id: Option<Uuid>,
    pub scheduled_plan_title: Option<String>,
    pub scheduled_credits: Option<i32>,
    pub scheduled_price_id: Option<String>,
    pub scheduled_effective_at: Option<DateTime<Utc>>,
    pub scheduled_confirmed: Option<bool>,
    pub scheduled_error: Option<String>,
}

impl From<Option<&ScheduledChange>> for ScheduledChangeColumns {
    fn from(change: Option<&ScheduledChange>) -> Self {
        match change {
            Some(change) => Self {
                scheduled_plan_id: Some(change.plan_id),
                scheduled_plan_title: Some(change.plan_title.clone()),
                scheduled_credits: Some(change.credits),
                scheduled_price_id: change.price_id.clone(),
                scheduled_effective_at: Some(change.effective_at),
                scheduled_confirmed: Some(change.confirmed),
                scheduled_error: change.error.clone(),
            },
            None => Self::default(),
        }
    }
}
