use crates::domain::{
    entities::memberships::MembershipEntity, repositories::memberships::MembershipRepository,
    value_objects::memberships::{CreditBalance, PeriodRoll},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{MembershipError, UseCaseResult},
    member_locks::{MemberGuard, MemberLocks},
};

/// Owns the `credits`/`credits_used` counters of a member's active membership.
///
/// The plain methods take the member lock themselves. The `*_guarded` variants are for
/// callers that already hold it (bookings, reconciliation) and must not lock twice.
pub struct CreditLedger<M>
where
    M: MembershipRepository + Send + Sync + 'static,
{
    membership_repo: Arc<M>,
    locks: Arc<MemberLocks>,
}

impl<M> CreditLedger<M>
where
    M: MembershipRepository + Send + Sync + 'static,
{
    pub fn new(membership_repo: Arc<M>, locks: Arc<MemberLocks>) -> Self {
        Self {
            membership_repo,
            locks,
        }
    }

    pub async fn balance(&self, member_id: Uuid) -> UseCaseResult<CreditBalance> {
        let membership = self.load_active(member_id).await?;
        Ok(membership.balance())
    }

    pub async fn charge(&self, member_id: Uuid, amount: u32) -> UseCaseResult<CreditBalance> {
        let guard = self.locks.lock(member_id).await;
        self.charge_guarded(&guard, amount).await
    }

    pub async fn charge_guarded(
        &self,
        guard: &MemberGuard,
        amount: u32,
    ) -> UseCaseResult<CreditBalance> {
        let member_id = guard.member_id();
        let membership = self.load_active(member_id).await?;

        if amount == 0 {
            return Ok(membership.balance());
        }

        let insufficient = |remaining: u32| MembershipError::InsufficientCredits {
            requested: amount,
            remaining,
        };

        let Ok(delta) = i32::try_from(amount) else {
            return Err(insufficient(membership.balance().remaining));
        };

        match self
            .membership_repo
            .try_consume_credits(membership.id, delta)
            .await
            .map_err(|err| {
                error!(%member_id, amount, db_error = ?err, "ledger: charge failed");
                MembershipError::Internal(err)
            })? {
            Some(balance) => {
                info!(
                    %member_id,
                    amount,
                    remaining = balance.remaining,
                    "ledger: credits charged"
                );
                Ok(balance)
            }
            None => {
                let remaining = membership.balance().remaining;
                warn!(%member_id, amount, remaining, "ledger: insufficient credits");
                Err(insufficient(remaining))
            }
        }
    }

    pub async fn refund(&self, member_id: Uuid, amount: u32) -> UseCaseResult<CreditBalance> {
        let guard = self.locks.lock(member_id).await;
        self.refund_guarded(&guard, amount).await
    }

    /// Gives credits back, never taking `credits_used` below zero.
    pub async fn refund_guarded(
        &self,
        guard: &MemberGuard,
        amount: u32,
    ) -> UseCaseResult<CreditBalance> {
        let member_id = guard.member_id();
        let membership = self.load_active(member_id).await?;

        if amount == 0 {
            return Ok(membership.balance());
        }

        let delta = i32::try_from(amount).unwrap_or(i32::MAX);
        let balance = self
            .membership_repo
            .release_credits(membership.id, delta)
            .await
            .map_err(|err| {
                error!(%member_id, amount, db_error = ?err, "ledger: refund failed");
                MembershipError::Internal(err)
            })?;

        info!(
            %member_id,
            amount,
            remaining = balance.remaining,
            "ledger: credits refunded"
        );
        Ok(balance)
    }

    pub async fn reset_for_new_period(
        &self,
        member_id: Uuid,
        new_credits: u32,
    ) -> UseCaseResult<CreditBalance> {
        let guard = self.locks.lock(member_id).await;
        let membership = self.load_active(member_id).await?;
        self.reset_guarded(&guard, &membership, new_credits).await
    }

    /// Starts a fresh period: `credits = new_credits`, `credits_used = 0`.
    pub async fn reset_guarded(
        &self,
        guard: &MemberGuard,
        membership: &MembershipEntity,
        new_credits: u32,
    ) -> UseCaseResult<CreditBalance> {
        let member_id = guard.member_id();
        let credits = i32::try_from(new_credits).unwrap_or(i32::MAX);

        let balance = self
            .membership_repo
            .reset_credits(membership.id, credits)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "ledger: period reset failed");
                MembershipError::Internal(err)
            })?;

        info!(%member_id, credits = new_credits, "ledger: credits reset for new period");
        Ok(balance)
    }

    /// Opens the next billing period together with its allowance, in a single storage write.
    pub async fn roll_period_guarded(
        &self,
        guard: &MemberGuard,
        membership: &MembershipEntity,
        roll: PeriodRoll,
    ) -> UseCaseResult<CreditBalance> {
        let member_id = guard.member_id();
        let credits = roll.credits;

        let balance = self
            .membership_repo
            .roll_period(membership.id, roll)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "ledger: period roll failed");
                MembershipError::Internal(err)
            })?;

        info!(%member_id, credits, "ledger: credits reset for new period");
        Ok(balance)
    }

    /// Changes the allowance mid-period, keeping usage but capping it at the new allowance.
    pub async fn reallocate_guarded(
        &self,
        guard: &MemberGuard,
        membership: &MembershipEntity,
        new_credits: u32,
    ) -> UseCaseResult<CreditBalance> {
        let member_id = guard.member_id();
        let credits = i32::try_from(new_credits).unwrap_or(i32::MAX);

        let balance = self
            .membership_repo
            .reallocate_credits(membership.id, credits)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "ledger: reallocation failed");
                MembershipError::Internal(err)
            })?;

        info!(
            %member_id,
            credits = new_credits,
            remaining = balance.remaining,
            "ledger: credits reallocated"
        );
        Ok(balance)
    }

    async fn load_active(&self, member_id: Uuid) -> UseCaseResult<MembershipEntity> {
        self.membership_repo
            .find_active_by_member(member_id)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "ledger: failed to load membership");
                MembershipError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%member_id, "ledger: no active membership");
                MembershipError::NotFound("membership")
            })
    }
}
