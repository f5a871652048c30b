use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::gym_classes};
use domain::{entities::gym_classes::GymClassEntity, repositories::gym_classes::GymClassRepository};

pub struct GymClassPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl GymClassPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl GymClassRepository for GymClassPostgres {
    async fn find_by_id(&self, class_id: Uuid) -> Result<Option<GymClassEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let class = gym_classes::table
            .find(class_id)
            .select(GymClassEntity::as_select())
            .first::<GymClassEntity>(&mut conn)
            .optional()?;

        Ok(class)
    }
}
