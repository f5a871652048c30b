use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::selected_gyms::SelectedGymEntity;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SelectedGymDto {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub added_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub status: String,
}

impl From<SelectedGymEntity> for SelectedGymDto {
    fn from(value: SelectedGymEntity) -> Self {
        Self {
            id: value.id,
            gym_id: value.gym_id,
            added_at: value.added_at,
            effective_from: value.effective_from,
            status: value.status,
        }
    }
}

/// A member's selections partitioned by status.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GymSelections {
    pub current: Vec<SelectedGymDto>,
    pub pending: Vec<SelectedGymDto>,
    /// Removed selections the member can still use until the period ends.
    pub ending: Vec<SelectedGymDto>,
    pub max_slots: u32,
}

#[derive(Debug, Deserialize)]
pub struct GymSelectionRequest {
    pub gym_id: Uuid,
}
