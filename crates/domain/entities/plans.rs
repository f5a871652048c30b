use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::plans;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub title: String,
    /// Credits granted at the start of every billing period.
    pub credits: i32,
    pub has_daily_access: bool,
    pub max_slots: i32,
    pub stripe_price_id: Option<String>,
    pub currency: String,
    pub price_minor: i32,
    pub duration_days: i32,
    pub is_active: bool,
}

impl PlanEntity {
    pub fn credits_or_zero(&self) -> u32 {
        u32::try_from(self.credits).unwrap_or(0)
    }

    pub fn max_slots_or_zero(&self) -> u32 {
        u32::try_from(self.max_slots).unwrap_or(0)
    }
}
