use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{
        memberships::MembershipEntity,
        plans::PlanEntity,
        selected_gyms::{InsertSelectedGymEntity, SelectedGymEntity},
    },
    repositories::{
        memberships::MembershipRepository, plans::PlanRepository,
        selected_gyms::SelectedGymRepository,
    },
    value_objects::{
        enums::selection_statuses::SelectionStatus,
        gym_slots::{GymSelections, SelectedGymDto},
    },
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    errors::{MembershipError, UseCaseResult},
    member_locks::{MemberGuard, MemberLocks},
};

/// Daily Access gym selections. Additions wait for the next billing period as `pending`;
/// removals keep the gym usable until then.
pub struct GymSlotScheduler<M, P, S>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
{
    membership_repo: Arc<M>,
    plan_repo: Arc<P>,
    selected_gym_repo: Arc<S>,
    locks: Arc<MemberLocks>,
    max_slots_override: Option<u32>,
}

impl<M, P, S> GymSlotScheduler<M, P, S>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
{
    pub fn new(
        membership_repo: Arc<M>,
        plan_repo: Arc<P>,
        selected_gym_repo: Arc<S>,
        locks: Arc<MemberLocks>,
        max_slots_override: Option<u32>,
    ) -> Self {
        Self {
            membership_repo,
            plan_repo,
            selected_gym_repo,
            locks,
            max_slots_override,
        }
    }

    pub async fn add_gym(&self, member_id: Uuid, gym_id: Uuid) -> UseCaseResult<SelectedGymDto> {
        let guard = self.locks.lock(member_id).await;
        let now = Utc::now();

        let membership = self.load_active_membership(member_id).await?;
        let plan = self.load_plan(member_id, membership.plan_id).await?;
        if !plan.has_daily_access {
            warn!(%member_id, plan_id = %plan.id, "gym_slots: plan has no daily access");
            return Err(MembershipError::DailyAccessRequired);
        }

        let selections = self.promote_and_list(&guard, now).await?;
        let max_slots = self.max_slots_for(&plan);
        let occupying: Vec<&SelectedGymEntity> =
            selections.iter().filter(|s| s.occupies_slot()).collect();

        if occupying.len() >= max_slots as usize {
            warn!(%member_id, max_slots, "gym_slots: slot limit reached");
            return Err(MembershipError::SlotLimitExceeded { max_slots });
        }

        if occupying.iter().any(|s| s.gym_id == gym_id) {
            warn!(%member_id, %gym_id, "gym_slots: gym already selected");
            return Err(MembershipError::AlreadySelected);
        }

        let selection = InsertSelectedGymEntity {
            id: Uuid::new_v4(),
            member_id,
            gym_id,
            added_at: now,
            effective_from: membership.end_date,
            status: SelectionStatus::Pending.to_string(),
        };

        let inserted = self
            .selected_gym_repo
            .insert_pending_within_limit(selection, i64::from(max_slots))
            .await
            .map_err(|err| {
                error!(%member_id, %gym_id, db_error = ?err, "gym_slots: insert failed");
                MembershipError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%member_id, max_slots, "gym_slots: slot limit reached at insert");
                MembershipError::SlotLimitExceeded { max_slots }
            })?;

        info!(
            %member_id,
            %gym_id,
            effective_from = %inserted.effective_from,
            "gym_slots: gym added as pending"
        );
        Ok(SelectedGymDto::from(inserted))
    }

    pub async fn remove_gym(&self, member_id: Uuid, gym_id: Uuid) -> UseCaseResult<()> {
        let guard = self.locks.lock(member_id).await;
        let now = Utc::now();

        let membership = self.load_active_membership(member_id).await?;
        let selections = self.promote_and_list(&guard, now).await?;

        let Some(selection) = selections
            .into_iter()
            .find(|s| s.gym_id == gym_id && s.occupies_slot())
        else {
            warn!(%member_id, %gym_id, "gym_slots: no selection to remove");
            return Err(MembershipError::NotFound("gym selection"));
        };

        match selection.selection_status() {
            Some(SelectionStatus::Pending) => {
                self.selected_gym_repo
                    .delete(selection.id)
                    .await
                    .map_err(|err| {
                        error!(%member_id, %gym_id, db_error = ?err, "gym_slots: delete failed");
                        MembershipError::Internal(err)
                    })?;
                info!(%member_id, %gym_id, "gym_slots: pending gym dropped");
            }
            _ => {
                self.selected_gym_repo
                    .mark_removed(selection.id, membership.end_date)
                    .await
                    .map_err(|err| {
                        error!(%member_id, %gym_id, db_error = ?err, "gym_slots: removal failed");
                        MembershipError::Internal(err)
                    })?;
                info!(
                    %member_id,
                    %gym_id,
                    usable_until = %membership.end_date,
                    "gym_slots: active gym scheduled for removal"
                );
            }
        }

        Ok(())
    }

    pub async fn list_selections(&self, member_id: Uuid) -> UseCaseResult<GymSelections> {
        let guard = self.locks.lock(member_id).await;
        let now = Utc::now();

        let membership = self.load_active_membership(member_id).await?;
        let plan = self.load_plan(member_id, membership.plan_id).await?;
        let selections = self.promote_and_list(&guard, now).await?;

        let mut result = GymSelections {
            max_slots: self.max_slots_for(&plan),
            ..GymSelections::default()
        };

        for selection in selections {
            match selection.selection_status() {
                Some(SelectionStatus::Active) => result.current.push(selection.into()),
                Some(SelectionStatus::Pending) => result.pending.push(selection.into()),
                Some(SelectionStatus::Removed) if selection.effective_from > now => {
                    result.ending.push(selection.into())
                }
                _ => {}
            }
        }

        Ok(result)
    }

    /// Promotes pending selections whose start has passed. Runs under the caller's member lock.
    pub async fn roll_selections(
        &self,
        guard: &MemberGuard,
        now: DateTime<Utc>,
    ) -> UseCaseResult<usize> {
        let member_id = guard.member_id();
        let promoted = self
            .selected_gym_repo
            .promote_due(member_id, now)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "gym_slots: promotion failed");
                MembershipError::Internal(err)
            })?;

        if promoted > 0 {
            info!(%member_id, promoted, "gym_slots: pending gyms activated");
        }
        Ok(promoted)
    }

    /// Whether the member may visit `gym_id` right now.
    pub async fn is_gym_usable_guarded(
        &self,
        guard: &MemberGuard,
        gym_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<bool> {
        let selections = self.promote_and_list(guard, now).await?;
        Ok(selections
            .iter()
            .any(|s| s.gym_id == gym_id && s.is_usable_at(now)))
    }

    pub async fn has_daily_access(&self, membership: &MembershipEntity) -> UseCaseResult<bool> {
        let plan = self.load_plan(membership.member_id, membership.plan_id).await?;
        Ok(plan.has_daily_access)
    }

    fn max_slots_for(&self, plan: &PlanEntity) -> u32 {
        self.max_slots_override
            .unwrap_or_else(|| plan.max_slots_or_zero())
    }

    async fn promote_and_list(
        &self,
        guard: &MemberGuard,
        now: DateTime<Utc>,
    ) -> UseCaseResult<Vec<SelectedGymEntity>> {
        self.roll_selections(guard, now).await?;

        let member_id = guard.member_id();
        self.selected_gym_repo
            .list_by_member(member_id)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "gym_slots: failed to list selections");
                MembershipError::Internal(err)
            })
    }

    async fn load_active_membership(&self, member_id: Uuid) -> UseCaseResult<MembershipEntity> {
        self.membership_repo
            .find_active_by_member(member_id)
            .await
            .map_err(|err| {
                error!(%member_id, db_error = ?err, "gym_slots: failed to load membership");
                MembershipError::Internal(err)
            })?
            .ok_or(MembershipError::NotFound("membership"))
    }

    async fn load_plan(&self, member_id: Uuid, plan_id: Uuid) -> UseCaseResult<PlanEntity> {
        self.plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%member_id, %plan_id, db_error = ?err, "gym_slots: failed to load plan");
                MembershipError::Internal(err)
            })?
            .ok_or(MembershipError::NotFound("plan"))
    }
}
