use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use backend::{
    usecases::{
        errors::UseCaseResult, member_locks::MemberLocks, payment_gateway::PaymentGateway,
        subscription_reconciler::SubscriptionReconciler,
    },
};
use crates::domain::{
    repositories::{
        memberships::MembershipRepository, plans::PlanRepository,
        selected_gyms::SelectedGymRepository,
    },
    value_objects::reconciliation::{SyncOutcome, SyncReport},
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What the worker needs from the reconciler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipSync: Send + Sync {
    async fn sync_all(&self) -> UseCaseResult<SyncReport>;
    async fn sync_one(&self, member_id: Uuid) -> UseCaseResult<SyncOutcome>;
}

#[async_trait]
impl<M, P, S, G> MembershipSync for SubscriptionReconciler<M, P, S, G>
where
    M: MembershipRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SelectedGymRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    async fn sync_all(&self) -> UseCaseResult<SyncReport> {
        SubscriptionReconciler::sync_all(self).await
    }

    async fn sync_one(&self, member_id: Uuid) -> UseCaseResult<SyncOutcome> {
        SubscriptionReconciler::sync_one(self, member_id).await
    }
}

pub async fn run(
    reconciler: Arc<dyn MembershipSync>,
    locks: Arc<MemberLocks>,
    interval: Duration,
) -> Result<()> {
    info!(interval_secs = interval.as_secs(), "reconciliation: starting worker loop");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        run_once(reconciler.as_ref(), &locks).await;
    }
}

/// One batch pass. Failures are logged and the loop keeps going.
pub async fn run_once(reconciler: &dyn MembershipSync, locks: &MemberLocks) -> Option<SyncReport> {
    let report = match reconciler.sync_all().await {
        Ok(report) => report,
        Err(err) => {
            error!(code = err.code(), error = %err, "reconciliation: batch failed");
            return None;
        }
    };

    if report.timed_out {
        warn!(
            processed = report.processed,
            not_processed = report.not_processed,
            "reconciliation: batch stopped at deadline"
        );
    }

    let pruned = locks.prune_idle();
    info!(
        processed = report.processed,
        errors = report.errors.len(),
        pruned_locks = pruned,
        "reconciliation: batch done"
    );
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::usecases::errors::MembershipError;

    #[tokio::test]
    async fn pass_returns_report_and_prunes_idle_locks() {
        let locks = MemberLocks::new();
        drop(locks.lock(Uuid::new_v4()).await);
        let mut reconciler = MockMembershipSync::new();
        reconciler.expect_sync_all().times(1).returning(|| {
            Ok(SyncReport {
                processed: 2,
                unchanged: 2,
                ..SyncReport::default()
            })
        });

        let report = run_once(&reconciler, &locks).await.unwrap();

        assert_eq!(report.processed, 2);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn failed_pass_is_swallowed() {
        let locks = MemberLocks::new();
        let mut reconciler = MockMembershipSync::new();
        reconciler
            .expect_sync_all()
            .returning(|| Err(MembershipError::Internal(anyhow::anyhow!("db down"))));

        assert!(run_once(&reconciler, &locks).await.is_none());
    }
}
