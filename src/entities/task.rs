use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub local_id: i64,
    #[sea_orm(indexed)]
    pub remote_id: Option<String>,
    #[sea_orm(indexed)]
    pub user_id: String,
    pub title: String,
    pub priority: String,
    pub completed: bool,
    pub all_day: bool,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub location: Option<String>,
    pub reminder_offset_minutes: Option<i32>,
    pub fcm_token: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
