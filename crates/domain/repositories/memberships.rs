use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::memberships::MembershipEntity;
use crate::domain::value_objects::memberships::{CreditBalance, PeriodRoll, ScheduledChange};

#[automock]
#[async_trait]
pub trait MembershipRepository {
    async fn find_active_by_member(&self, member_id: Uuid) -> Result<Option<MembershipEntity>>;

    /// The active membership if any, otherwise the most recently created one.
    async fn find_latest_by_member(&self, member_id: Uuid) -> Result<Option<MembershipEntity>>;

    async fn find_by_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<MembershipEntity>>;

    async fn list_members_with_subscription(&self) -> Result<Vec<Uuid>>;

    /// Adds `amount` to `credits_used` only if the result stays within `credits`.
    /// Returns `None` when the compare-and-set did not apply.
    async fn try_consume_credits(
        &self,
        membership_id: Uuid,
        amount: i32,
    ) -> Result<Option<CreditBalance>>;

    /// Subtracts `amount` from `credits_used`, floored at zero.
    async fn release_credits(&self, membership_id: Uuid, amount: i32) -> Result<CreditBalance>;

    async fn reset_credits(&self, membership_id: Uuid, credits: i32) -> Result<CreditBalance>;

    /// Sets `credits`, clamping `credits_used` so it never exceeds the new allocation.
    async fn reallocate_credits(&self, membership_id: Uuid, credits: i32)
    -> Result<CreditBalance>;

    async fn update_stripe_status(&self, membership_id: Uuid, stripe_status: &str) -> Result<()>;

    async fn update_subscription_ref(
        &self,
        membership_id: Uuid,
        stripe_subscription_id: &str,
        stripe_status: &str,
    ) -> Result<()>;

    /// Moves the membership into a new billing period with a fresh allowance, switching
    /// plans when the roll carries one. All or nothing.
    async fn roll_period(&self, membership_id: Uuid, roll: PeriodRoll) -> Result<CreditBalance>;

    /// Marks the membership active and deactivates any other active membership of the member.
    async fn activate(&self, membership_id: Uuid) -> Result<()>;

    async fn deactivate(&self, membership_id: Uuid) -> Result<()>;

    async fn assign_plan(&self, membership_id: Uuid, plan_id: Uuid, plan_title: &str)
    -> Result<()>;

    async fn save_scheduled_change(
        &self,
        membership_id: Uuid,
        change: Option<ScheduledChange>,
    ) -> Result<()>;
}
