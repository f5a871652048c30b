use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::plans::PlanEntity;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanDto {
    pub id: Uuid,
    pub title: String,
    pub credits: i32,
    pub has_daily_access: bool,
    pub max_slots: i32,
    pub currency: String,
    pub price_minor: i32,
    pub duration_days: i32,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            credits: value.credits,
            has_daily_access: value.has_daily_access,
            max_slots: value.max_slots,
            currency: value.currency,
            price_minor: value.price_minor,
            duration_days: value.duration_days,
        }
    }
}
