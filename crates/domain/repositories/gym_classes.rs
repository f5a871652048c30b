use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::gym_classes::GymClassEntity;

#[automock]
#[async_trait]
pub trait GymClassRepository {
    async fn find_by_id(&self, class_id: Uuid) -> Result<Option<GymClassEntity>>;
}
