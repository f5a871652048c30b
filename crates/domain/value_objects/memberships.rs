use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::memberships::MembershipEntity;

/// A plan swap agreed with the payment provider, applied when the billing period rolls.
///
/// `confirmed` only turns true once the provider acknowledged the schedule. An unconfirmed
/// change carrying an `error` is retried by the next reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledChange {
    pub plan_id: Uuid,
    pub plan_title: String,
    pub credits: i32,
    pub price_id: Option<String>,
    pub effective_at: DateTime<Utc>,
    pub confirmed: bool,
    pub error: Option<String>,
}

/// Everything a billing period roll writes. Stored as one unit so a failed write never
/// leaves the new period boundary behind with the old period's usage.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRoll {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub credits: i32,
    /// Plan taking over with this period. Setting it also clears the scheduled change.
    pub plan: Option<(Uuid, String)>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditBalance {
    pub credits: u32,
    pub credits_used: u32,
    pub remaining: u32,
}

impl CreditBalance {
    /// Builds a balance from raw storage counters, clamping anything negative to zero.
    pub fn from_counters(credits: i32, credits_used: i32) -> Self {
        let credits = u32::try_from(credits).unwrap_or(0);
        let credits_used = u32::try_from(credits_used).unwrap_or(0);
        Self {
            credits,
            credits_used,
            remaining: credits.saturating_sub(credits_used),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MembershipDto {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub plan_title: String,
    pub balance: CreditBalance,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub stripe_status: Option<String>,
    pub scheduled_change: Option<ScheduledChange>,
}

impl From<MembershipEntity> for MembershipDto {
    fn from(value: MembershipEntity) -> Self {
        Self {
            id: value.id,
            plan_id: value.plan_id,
            balance: value.balance(),
            plan_title: value.plan_title,
            start_date: value.start_date,
            end_date: value.end_date,
            is_active: value.is_active,
            stripe_status: value.stripe_status,
            scheduled_change: value.scheduled_change,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreditAmountRequest {
    pub amount: u32,
}

#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub plan_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_never_goes_negative() {
        let balance = CreditBalance::from_counters(3, 5);
        assert_eq!(balance.remaining, 0);

        let balance = CreditBalance::from_counters(-1, -4);
        assert_eq!(balance.credits, 0);
        assert_eq!(balance.credits_used, 0);
        assert_eq!(balance.remaining, 0);

        let balance = CreditBalance::from_counters(10, 4);
        assert_eq!(balance.remaining, 6);
    }
}
