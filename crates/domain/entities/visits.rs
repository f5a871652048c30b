use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::visits;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = visits)]
pub struct VisitEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub member_id: Uuid,
    pub gym_id: Option<Uuid>,
    pub credits_used: i32,
    pub status: String,
    pub visited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = visits)]
pub struct InsertVisitEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub member_id: Uuid,
    pub gym_id: Option<Uuid>,
    pub credits_used: i32,
    pub status: String,
    pub visited_at: DateTime<Utc>,
}
