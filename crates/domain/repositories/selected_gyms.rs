use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::selected_gyms::{InsertSelectedGymEntity, SelectedGymEntity};

#[automock]
#[async_trait]
pub trait SelectedGymRepository {
    async fn list_by_member(&self, member_id: Uuid) -> Result<Vec<SelectedGymEntity>>;

    /// Inserts the selection only if the member still holds fewer than `max_slots`
    /// occupying rows when the transaction commits. `None` means the limit was hit.
    async fn insert_pending_within_limit(
        &self,
        selection: InsertSelectedGymEntity,
        max_slots: i64,
    ) -> Result<Option<SelectedGymEntity>>;

    async fn delete(&self, selection_id: Uuid) -> Result<()>;

    async fn mark_removed(&self, selection_id: Uuid, effective_from: DateTime<Utc>) -> Result<()>;

    /// Turns pending selections whose `effective_from` has passed into active ones.
    async fn promote_due(&self, member_id: Uuid, now: DateTime<Utc>) -> Result<usize>;
}
