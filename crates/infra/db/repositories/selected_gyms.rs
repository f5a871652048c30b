use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, dsl::count_star, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{memberships, selected_gyms},
};
use domain::{
    entities::selected_gyms::{InsertSelectedGymEntity, SelectedGymEntity},
    repositories::selected_gyms::SelectedGymRepository,
    value_objects::enums::selection_statuses::SelectionStatus,
};

pub struct SelectedGymPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SelectedGymPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SelectedGymRepository for SelectedGymPostgres {
    async fn list_by_member(&self, member_id: Uuid) -> Result<Vec<SelectedGymEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = selected_gyms::table
            .filter(selected_gyms::member_id.eq(member_id))
            .order(selected_gyms::added_at.asc())
            .select(SelectedGymEntity::as_select())
            .load::<SelectedGymEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn insert_pending_within_limit(
        &self,
        selection: InsertSelectedGymEntity,
        max_slots: i64,
    ) -> Result<Option<SelectedGymEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let occupying: Vec<String> = SelectionStatus::occupying()
            .iter()
            .map(|status| status.to_string())
            .collect();

        let inserted = conn.transaction::<Option<SelectedGymEntity>, diesel::result::Error, _>(
            |tx| {
                // Serializes slot allocation per member across processes.
                memberships::table
                    .filter(memberships::member_id.eq(selection.member_id))
                    .filter(memberships::is_active.eq(true))
                    .select(memberships::id)
                    .for_update()
                    .load::<Uuid>(tx)?;

                let held = selected_gyms::table
                    .filter(selected_gyms::member_id.eq(selection.member_id))
                    .filter(selected_gyms::status.eq_any(&occupying))
                    .select(count_star())
                    .first::<i64>(tx)?;

                if held >= max_slots {
                    return Ok(None);
                }

                let row = insert_into(selected_gyms::table)
                    .values(&selection)
                    .returning(SelectedGymEntity::as_returning())
                    .get_result::<SelectedGymEntity>(tx)?;

                Ok(Some(row))
            },
        )?;

        Ok(inserted)
    }

    async fn delete(&self, selection_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(selected_gyms::table.find(selection_id)).execute(&mut conn)?;

        Ok(())
    }

    async fn mark_removed(&self, selection_id: Uuid, effective_from: DateTime<Utc>) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(selected_gyms::table.find(selection_id))
            .set((
                selected_gyms::status.eq(SelectionStatus::Removed.to_string()),
                selected_gyms::effective_from.eq(effective_from),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn promote_due(&self, member_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let promoted = update(selected_gyms::table)
            .filter(selected_gyms::member_id.eq(member_id))
            .filter(selected_gyms::status.eq(SelectionStatus::Pending.to_string()))
            .filter(selected_gyms::effective_from.le(now))
            .set(selected_gyms::status.eq(SelectionStatus::Active.to_string()))
            .execute(&mut conn)?;

        Ok(promoted)
    }
}
