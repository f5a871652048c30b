use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use crates::{
    domain::{
        entities::{memberships::MembershipEntity, plans::PlanEntity},
        repositories::{
            memberships::MembershipRepository, plans::PlanRepository,
            selected_gyms::SelectedGymRepository,
        },
        value_objects::{
            enums::{
                price_change_timings::PriceChangeTiming,
                provider_subscription_statuses::ProviderSubscriptionStatus,
            },
            memberships::{PeriodRoll, ScheduledChange},
            reconciliation::{PlanChangeOutcome, SyncFailure, SyncOutcome, SyncReport},
        },
    },
    payments::stripe_client::StripeSubscription,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    credit_ledger::CreditLedger,
    errors::{MembershipError, UseCaseResult},
    gym_slots::GymSlotScheduler,
    member_locks::{MemberGuard, MemberLocks},
    payment_gateway::PaymentGateway,
    settings::CoreSettings,
};

/// Provider period starts this close to the local period end still count as a roll.
const PERIOD_ROLL_TOLERANCE: chrono::Duration = chrono::Duration::hours(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff: `base * 2^(attempt - 1)`, capped.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Keeps local memberships in line with the payment provider's subscriptions.
pub struct SubscriptionReconciler<M, P, S, G>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    membership_repo: Arc<M>,
    plan_repo: Arc<P>,
    ledger: Arc<CreditLedger<M>>,
    scheduler: Arc<GymSlotScheduler<M, P, S>>,
    gateway: Arc<G>,
    locks: Arc<MemberLocks>,
    settings: CoreSettings,
}

impl<M, P, S, G> SubscriptionReconciler<M, P, S, G>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        membership_repo: Arc<M>,
        plan_repo: Arc<P>,
        ledger: Arc<CreditLedger<M>>,
        scheduler: Arc<GymSlotScheduler<M, P, S>>,
        gateway: Arc<G>,
        locks: Arc<MemberLocks>,
        settings: CoreSettings,
    ) -> Self {
        Self {
            membership_repo,
            plan_repo,
            ledger,
            scheduler,
            gateway,
            locks,
            settings,
        }
    }

    pub async fn sync_one(&self, member_id: Uuid) -> UseCaseResult<SyncOutcome> {
        let membership = self.load_latest(member_id).await?;
        let Some(subscription_id) = membership.stripe_subscription_id.clone() else {
            debug!(%member_id, "reconciler: no provider subscription");
            return Ok(SyncOutcome::Unchanged);
        };

        // Read the provider before locking so a slow provider never holds up the member.
        let gateway = &self.gateway;
        let id = subscription_id.as_str();
        let subscription = self
            .call_provider(
                member_id,
                "get_subscription",
                self.settings.provider_max_retries,
                move || gateway.get_subscription(id),
            )
            .await?;

        let guard = self.locks.lock(member_id).await;
        let membership = self.load_latest(member_id).await?;
        self.apply_subscription(&guard, membership, &subscription_id, &subscription)
            .await
    }

    pub async fn sync_all(&self) -> UseCaseResult<SyncReport> {
        let member_ids = self
            .membership_repo
            .list_members_with_subscription()
            .await
            .map_err(|err| {
                error!(db_error = ?err, "reconciler: failed to list subscribed members");
                MembershipError::Internal(err)
            })?;

        let total = member_ids.len();
        let deadline = Instant::now() + self.settings.sync_batch_deadline;
        let mut report = SyncReport::default();
        info!(total, "reconciler: batch sync started");

        for (index, member_id) in member_ids.into_iter().enumerate() {
            match tokio::time::timeout_at(deadline, self.sync_one(member_id)).await {
                Ok(Ok(outcome)) => report.record_outcome(member_id, &outcome),
                Ok(Err(err)) => {
                    warn!(%member_id, code = err.code(), error = %err, "reconciler: member sync failed");
                    report.record_failure(SyncFailure {
                        member_id,
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                }
                Err(_) => {
                    report.timed_out = true;
                    report.not_processed = total - index;
                    warn!(
                        processed = report.processed,
                        not_processed = report.not_processed,
                        "reconciler: batch deadline reached"
                    );
                    break;
                }
            }
        }

        info!(
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            errors = report.errors.len(),
            timed_out = report.timed_out,
            "reconciler: batch sync finished"
        );
        Ok(report)
    }

    /// Switches plans right away when there is no provider subscription, otherwise asks
    /// the provider to switch at the next renewal and records the pending change.
    pub async fn schedule_plan_change(
        &self,
        member_id: Uuid,
        new_plan_id: Uuid,
    ) -> UseCaseResult<PlanChangeOutcome> {
        let guard = self.locks.lock(member_id).await;

        let membership = self
            .membership_repo
            .find_active_by_member(member_id)
            .await
            .map_err(|err| self.db_error(member_id, "load membership", err))?
            .ok_or(MembershipError::NotFound("membership"))?;

        if membership.plan_id == new_plan_id {
            return self.withdraw_change(&guard, &membership).await;
        }

        let current_plan = self.load_plan(member_id, membership.plan_id).await?;
        let target_plan = self.load_plan(member_id, new_plan_id).await?;
        if !target_plan.is_active {
            return Err(MembershipError::NotFound("plan"));
        }

        if !current_plan.currency.eq_ignore_ascii_case(&target_plan.currency) {
            warn!(
                %member_id,
                current = %current_plan.currency,
                requested = %target_plan.currency,
                "reconciler: plan currency mismatch"
            );
            return Err(MembershipError::CurrencyMismatch {
                current: current_plan.currency,
                requested: target_plan.currency,
            });
        }

        let Some(subscription_id) = membership.stripe_subscription_id.clone() else {
            self.apply_plan_now(&guard, &membership, &target_plan).await?;
            return Ok(PlanChangeOutcome::Applied {
                plan_id: target_plan.id,
            });
        };

        let price_id = target_plan
            .stripe_price_id
            .clone()
            .ok_or(MembershipError::NotFound("plan price"))?;

        let trialing = membership
            .stripe_status
            .as_deref()
            .map(ProviderSubscriptionStatus::from_str)
            == Some(ProviderSubscriptionStatus::Trialing);
        if trialing {
            // Nothing has been billed yet, so the provider switches now as well.
            let gateway = &self.gateway;
            let (id, price) = (subscription_id.as_str(), price_id.as_str());
            self.call_provider(member_id, "update_subscription_price", 1, move || {
                gateway.update_subscription_price(id, price, PriceChangeTiming::Immediate)
            })
            .await?;
            self.apply_plan_now(&guard, &membership, &target_plan).await?;
            return Ok(PlanChangeOutcome::Applied {
                plan_id: target_plan.id,
            });
        }

        let mut change = ScheduledChange {
            plan_id: target_plan.id,
            plan_title: target_plan.title.clone(),
            credits: target_plan.credits,
            price_id: Some(price_id),
            effective_at: membership.end_date,
            confirmed: false,
            error: None,
        };
        self.save_change(member_id, membership.id, Some(change.clone()))
            .await?;

        match self.request_schedule(member_id, &subscription_id, &change).await {
            Ok(()) => {
                change.confirmed = true;
                self.save_change(member_id, membership.id, Some(change.clone()))
                    .await?;
                info!(
                    %member_id,
                    plan_id = %change.plan_id,
                    effective_at = %change.effective_at,
                    "reconciler: plan change scheduled"
                );
                Ok(PlanChangeOutcome::Scheduled { change })
            }
            Err(err) => {
                change.error = Some(err.to_string());
                self.save_change(member_id, membership.id, Some(change)).await?;
                Err(err)
            }
        }
    }

    /// Creates the provider subscription for a membership that has a customer but no
    /// subscription yet, then reconciles it.
    pub async fn start_subscription(&self, member_id: Uuid) -> UseCaseResult<SyncOutcome> {
        {
            let _guard = self.locks.lock(member_id).await;
            let membership = self.load_latest(member_id).await?;

            if membership.stripe_subscription_id.is_none() {
                let customer_id = membership
                    .stripe_customer_id
                    .clone()
                    .ok_or(MembershipError::NotFound("payment customer"))?;
                let plan = self.load_plan(member_id, membership.plan_id).await?;
                let price_id = plan
                    .stripe_price_id
                    .clone()
                    .ok_or(MembershipError::NotFound("plan price"))?;

                let gateway = &self.gateway;
                let (customer, price) = (customer_id.as_str(), price_id.as_str());
                // Creation is not idempotent, so a single attempt.
                let subscription = self
                    .call_provider(member_id, "create_subscription", 1, move || {
                        gateway.create_subscription(customer, price)
                    })
                    .await?;

                self.membership_repo
                    .update_subscription_ref(membership.id, &subscription.id, &subscription.status)
                    .await
                    .map_err(|err| self.db_error(member_id, "store subscription", err))?;
                info!(
                    %member_id,
                    subscription_id = %subscription.id,
                    "reconciler: provider subscription created"
                );
            }
        }

        self.sync_one(member_id).await
    }

    /// Asks the provider to stop renewing. Access ends when a later sync sees the terminal status.
    pub async fn cancel_subscription(&self, member_id: Uuid) -> UseCaseResult<()> {
        let membership = self.load_latest(member_id).await?;
        let subscription_id = membership
            .stripe_subscription_id
            .ok_or(MembershipError::NotFound("subscription"))?;

        let gateway = &self.gateway;
        let id = subscription_id.as_str();
        self.call_provider(
            member_id,
            "cancel_subscription",
            self.settings.provider_max_retries,
            move || gateway.cancel_subscription(id),
        )
        .await?;

        info!(%member_id, %subscription_id, "reconciler: cancellation requested");
        Ok(())
    }

    /// Verifies a provider webhook and reconciles the member it concerns. `None` when the
    /// event is irrelevant or names an unknown subscription.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<Option<SyncOutcome>> {
        let event = self
            .gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "reconciler: webhook rejected");
                MembershipError::InvalidWebhook(err.to_string())
            })?;

        let Some(subscription_id) = event.subscription_id() else {
            debug!(event_type = %event.type_, "reconciler: webhook event ignored");
            return Ok(None);
        };

        let membership = self
            .membership_repo
            .find_by_subscription_id(&subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "reconciler: subscription lookup failed");
                MembershipError::Internal(err)
            })?;

        let Some(membership) = membership else {
            warn!(%subscription_id, event_type = %event.type_, "reconciler: webhook for unknown subscription");
            return Ok(None);
        };

        info!(
            member_id = %membership.member_id,
            event_type = %event.type_,
            "reconciler: webhook triggered sync"
        );
        self.sync_one(membership.member_id).await.map(Some)
    }

    async fn apply_subscription(
        &self,
        guard: &MemberGuard,
        membership: MembershipEntity,
        subscription_id: &str,
        subscription: &StripeSubscription,
    ) -> UseCaseResult<SyncOutcome> {
        let member_id = guard.member_id();
        let now = Utc::now();
        let status = ProviderSubscriptionStatus::from_str(&subscription.status);
        let mut changes: Vec<String> = Vec::new();

        if membership.stripe_status.as_deref() != Some(subscription.status.as_str()) {
            self.membership_repo
                .update_stripe_status(membership.id, &subscription.status)
                .await
                .map_err(|err| self.db_error(member_id, "update status", err))?;
            info!(
                %member_id,
                from = ?membership.stripe_status,
                to = %subscription.status,
                "reconciler: provider status changed"
            );
            changes.push("stripe_status".to_string());
        }

        if !membership.is_active {
            if !status.grants_access() {
                return Ok(outcome_from(changes));
            }
            return self
                .activate_membership(guard, &membership, subscription)
                .await;
        }

        if status.is_terminal() {
            self.membership_repo
                .deactivate(membership.id)
                .await
                .map_err(|err| self.db_error(member_id, "deactivate", err))?;
            info!(%member_id, status = %status, "reconciler: membership deactivated");
            changes.push("deactivated".to_string());
            return Ok(outcome_from(changes));
        }

        let mut pending_change = membership.scheduled_change.clone();

        let rolled_period = match (subscription.period_start_at(), subscription.period_end_at()) {
            (Some(start), Some(end))
                if start + PERIOD_ROLL_TOLERANCE >= membership.end_date
                    && end > membership.end_date =>
            {
                Some((start, end))
            }
            _ => None,
        };

        if let Some((start, end)) = rolled_period {
            let mut roll = PeriodRoll {
                start_date: start,
                end_date: end,
                credits: 0,
                plan: None,
            };

            match pending_change.take() {
                Some(change)
                    if change.confirmed
                        && change.price_id.as_deref() == subscription.current_price_id() =>
                {
                    roll.credits = change.credits.max(0);
                    roll.plan = Some((change.plan_id, change.plan_title.clone()));
                    self.ledger.roll_period_guarded(guard, &membership, roll).await?;
                    info!(
                        %member_id,
                        from = %membership.plan_id,
                        to = %change.plan_id,
                        "reconciler: scheduled plan change applied"
                    );
                    changes.push("plan_changed".to_string());
                }
                other => {
                    if let Some(change) = other.as_ref() {
                        warn!(
                            %member_id,
                            plan_id = %change.plan_id,
                            confirmed = change.confirmed,
                            "reconciler: provider price differs from scheduled change, keeping plan"
                        );
                    }
                    pending_change = other;

                    let plan = self.load_plan(member_id, membership.plan_id).await?;
                    roll.credits = plan.credits.max(0);
                    self.ledger.roll_period_guarded(guard, &membership, roll).await?;
                    changes.push("credits_reset".to_string());
                }
            }
            changes.push("period".to_string());

            info!(%member_id, period_start = %start, period_end = %end, "reconciler: billing period rolled");
        }

        if self.scheduler.roll_selections(guard, now).await? > 0 {
            changes.push("selections".to_string());
        }

        if let Some(change) = pending_change.filter(|change| !change.confirmed) {
            if self
                .retry_unconfirmed_change(member_id, membership.id, subscription_id, change)
                .await?
            {
                changes.push("plan_change_confirmed".to_string());
            }
        }

        Ok(outcome_from(changes))
    }

    async fn activate_membership(
        &self,
        guard: &MemberGuard,
        membership: &MembershipEntity,
        subscription: &StripeSubscription,
    ) -> UseCaseResult<SyncOutcome> {
        let member_id = guard.member_id();

        self.membership_repo
            .activate(membership.id)
            .await
            .map_err(|err| self.db_error(member_id, "activate", err))?;

        let plan = self.load_plan(member_id, membership.plan_id).await?;
        match (subscription.period_start_at(), subscription.period_end_at()) {
            (Some(start), Some(end)) => {
                let roll = PeriodRoll {
                    start_date: start,
                    end_date: end,
                    credits: plan.credits.max(0),
                    plan: None,
                };
                self.ledger.roll_period_guarded(guard, membership, roll).await?;
            }
            _ => {
                self.ledger
                    .reset_guarded(guard, membership, plan.credits_or_zero())
                    .await?;
            }
        }
        self.scheduler.roll_selections(guard, Utc::now()).await?;

        info!(%member_id, plan_id = %plan.id, "reconciler: membership activated from provider");
        Ok(SyncOutcome::Created)
    }

    /// Handles a request for the plan the member is already on. A pending switch is
    /// dropped once the provider is back on the current price.
    async fn withdraw_change(
        &self,
        guard: &MemberGuard,
        membership: &MembershipEntity,
    ) -> UseCaseResult<PlanChangeOutcome> {
        let member_id = guard.member_id();
        let Some(change) = membership.scheduled_change.as_ref() else {
            info!(%member_id, plan_id = %membership.plan_id, "reconciler: plan unchanged");
            return Ok(PlanChangeOutcome::Unchanged);
        };

        if let Some(subscription_id) = membership.stripe_subscription_id.as_deref() {
            let plan = self.load_plan(member_id, membership.plan_id).await?;
            let price_id = plan
                .stripe_price_id
                .ok_or(MembershipError::NotFound("plan price"))?;
            self.schedule_price(member_id, subscription_id, &price_id)
                .await?;
        }

        self.save_change(member_id, membership.id, None).await?;
        info!(
            %member_id,
            withdrawn = %change.plan_id,
            "reconciler: scheduled plan change withdrawn"
        );
        Ok(PlanChangeOutcome::Withdrawn {
            plan_id: change.plan_id,
        })
    }

    async fn apply_plan_now(
        &self,
        guard: &MemberGuard,
        membership: &MembershipEntity,
        plan: &PlanEntity,
    ) -> UseCaseResult<()> {
        let member_id = guard.member_id();

        self.membership_repo
            .assign_plan(membership.id, plan.id, &plan.title)
            .await
            .map_err(|err| self.db_error(member_id, "assign plan", err))?;
        self.ledger
            .reallocate_guarded(guard, membership, plan.credits_or_zero())
            .await?;
        if membership.scheduled_change.is_some() {
            self.save_change(member_id, membership.id, None).await?;
        }

        info!(%member_id, plan_id = %plan.id, "reconciler: plan applied immediately");
        Ok(())
    }

    /// One more scheduling attempt for a change the provider never acknowledged.
    async fn retry_unconfirmed_change(
        &self,
        member_id: Uuid,
        membership_id: Uuid,
        subscription_id: &str,
        mut change: ScheduledChange,
    ) -> UseCaseResult<bool> {
        match self.request_schedule(member_id, subscription_id, &change).await {
            Ok(()) => {
                change.confirmed = true;
                change.error = None;
                self.save_change(member_id, membership_id, Some(change)).await?;
                info!(%member_id, "reconciler: pending plan change confirmed on retry");
                Ok(true)
            }
            Err(err) => {
                change.error = Some(err.to_string());
                self.save_change(member_id, membership_id, Some(change)).await?;
                Ok(false)
            }
        }
    }

    async fn request_schedule(
        &self,
        member_id: Uuid,
        subscription_id: &str,
        change: &ScheduledChange,
    ) -> UseCaseResult<()> {
        let price_id = change
            .price_id
            .as_deref()
            .ok_or(MembershipError::NotFound("plan price"))?;
        self.schedule_price(member_id, subscription_id, price_id).await
    }

    /// Runs under the member lock: one attempt, bounded by the provider timeout.
    async fn schedule_price(
        &self,
        member_id: Uuid,
        subscription_id: &str,
        price_id: &str,
    ) -> UseCaseResult<()> {
        let gateway = &self.gateway;
        self.call_provider(member_id, "update_subscription_price", 1, move || {
            gateway.update_subscription_price(subscription_id, price_id, PriceChangeTiming::Scheduled)
        })
        .await
    }

    async fn call_provider<T, F, Fut>(
        &self,
        member_id: Uuid,
        operation: &'static str,
        attempts: u32,
        call: F,
    ) -> UseCaseResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = attempts.max(1);
        let timeout = self.settings.provider_timeout;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => last_error = err.to_string(),
                Err(_) => last_error = format!("timed out after {}ms", timeout.as_millis()),
            }

            warn!(
                %member_id,
                operation,
                attempt,
                attempts,
                error = %last_error,
                "reconciler: provider call failed"
            );

            if attempt < attempts {
                tokio::time::sleep(backoff_delay(self.settings.provider_retry_base, attempt)).await;
            }
        }

        Err(MembershipError::ProviderUnavailable(format!(
            "{operation}: {last_error}"
        )))
    }

    async fn save_change(
        &self,
        member_id: Uuid,
        membership_id: Uuid,
        change: Option<ScheduledChange>,
    ) -> UseCaseResult<()> {
        self.membership_repo
            .save_scheduled_change(membership_id, change)
            .await
            .map_err(|err| self.db_error(member_id, "save scheduled change", err))
    }

    async fn load_latest(&self, member_id: Uuid) -> UseCaseResult<MembershipEntity> {
        self.membership_repo
            .find_latest_by_member(member_id)
            .await
            .map_err(|err| self.db_error(member_id, "load membership", err))?
            .ok_or(MembershipError::NotFound("membership"))
    }

    async fn load_plan(&self, member_id: Uuid, plan_id: Uuid) -> UseCaseResult<PlanEntity> {
        self.plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| self.db_error(member_id, "load plan", err))?
            .ok_or(MembershipError::NotFound("plan"))
    }

    fn db_error(&self, member_id: Uuid, action: &'static str, err: anyhow::Error) -> MembershipError {
        error!(%member_id, action, db_error = ?err, "reconciler: storage call failed");
        MembershipError::Internal(err)
    }
}

fn outcome_from(changes: Vec<String>) -> SyncOutcome {
    if changes.is_empty() {
        SyncOutcome::Unchanged
    } else {
        SyncOutcome::Updated { changes }
    }
}
