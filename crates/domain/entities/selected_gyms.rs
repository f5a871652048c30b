use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::selection_statuses::SelectionStatus,
    infra::db::postgres::schema::selected_gyms,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = selected_gyms)]
pub struct SelectedGymEntity {
    pub id: Uuid,
    pub member_id: Uuid,
    pub gym_id: Uuid,
    pub added_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub status: String,
}

impl SelectedGymEntity {
    pub fn selection_status(&self) -> Option<SelectionStatus> {
        SelectionStatus::from_str(&self.status)
    }

    pub fn occupies_slot(&self) -> bool {
        self.selection_status()
            .is_some_and(|status| status.occupies_slot())
    }

    /// Active selections, plus removed ones still inside the period the member paid for.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        match self.selection_status() {
            Some(SelectionStatus::Active) => true,
            Some(SelectionStatus::Removed) => self.effective_from > now,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = selected_gyms)]
pub struct InsertSelectedGymEntity {
    pub id: Uuid,
    pub member_id: Uuid,
    pub gym_id: Uuid,
    pub added_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub status: String,
}
