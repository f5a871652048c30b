use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::memberships::ScheduledChange;

/// What a single reconciliation pass did to a member's records.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Unchanged,
    /// A membership waiting on the provider became active.
    Created,
    Updated { changes: Vec<String> },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncFailure {
    pub member_id: Uuid,
    pub code: String,
    pub message: String,
}

/// Aggregate result of a batch sync. One member failing never aborts the batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SyncReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<SyncFailure>,
    /// Members handled before the batch ended, in processing order.
    pub processed_members: Vec<Uuid>,
    /// Members the batch never reached because its deadline passed.
    pub not_processed: usize,
    pub timed_out: bool,
}

impl SyncReport {
    pub fn record_outcome(&mut self, member_id: Uuid, outcome: &SyncOutcome) {
        self.processed += 1;
        self.processed_members.push(member_id);
        match outcome {
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated { .. } => self.updated += 1,
        }
    }

    pub fn record_failure(&mut self, failure: SyncFailure) {
        self.processed += 1;
        self.processed_members.push(failure.member_id);
        self.errors.push(failure);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanChangeOutcome {
    /// The member was already on the requested plan.
    Unchanged,
    /// The plan switched right away: no external subscription yet, or still in trial.
    Applied { plan_id: Uuid },
    /// The provider accepted the change for the next renewal.
    Scheduled { change: ScheduledChange },
    /// The member asked for their current plan, dropping the pending switch to `plan_id`.
    Withdrawn { plan_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_every_processed_member_once() {
        let mut report = SyncReport::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        report.record_outcome(first, &SyncOutcome::Created);
        report.record_outcome(
            second,
            &SyncOutcome::Updated {
                changes: vec!["stripe_status".to_string()],
            },
        );
        report.record_failure(SyncFailure {
            member_id: third,
            code: "provider_unavailable".to_string(),
            message: "timeout".to_string(),
        });

        assert_eq!(report.processed, 3);
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.processed_members, vec![first, second, third]);
    }
}
