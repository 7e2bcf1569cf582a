//! Task repository for database operations.
//!
//! Every query is scoped to a user id: the cache never hands out tasks that
//! belong to someone other than the caller.

use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

use crate::entities::task;
use crate::error::Result;
use crate::task::Task;
use crate::utils::datetime;

/// Columns rewritten when an upsert hits an existing local id.
const UPSERT_COLUMNS: [task::Column; 11] = [
    task::Column::RemoteId,
    task::Column::UserId,
    task::Column::Title,
    task::Column::Priority,
    task::Column::Completed,
    task::Column::AllDay,
    task::Column::StartTime,
    task::Column::EndTime,
    task::Column::Location,
    task::Column::ReminderOffsetMinutes,
    task::Column::FcmToken,
];

/// Repository for task-related database operations.
pub struct TaskRepository;

impl TaskRepository {
    /// All tasks of a user, ordered by start time (unscheduled last) and then
    /// by newest local id.
    pub async fn list_by_user<C>(conn: &C, user_id: &str) -> Result<Vec<Task>>
    where
        C: ConnectionTrait,
    {
        let models = task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .order_by_asc(Expr::col(task::Column::StartTime).is_null())
            .order_by_asc(task::Column::StartTime)
            .order_by_desc(task::Column::LocalId)
            .all(conn)
            .await?;
        Ok(models.into_iter().map(Self::to_domain).collect())
    }

    /// Get a single cached task by its remote id.
    pub async fn get_by_remote_id<C>(conn: &C, user_id: &str, remote_id: &str) -> Result<Option<Task>>
    where
        C: ConnectionTrait,
    {
        Ok(task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .filter(task::Column::RemoteId.eq(remote_id))
            .one(conn)
            .await?
            .map(Self::to_domain))
    }

    /// Insert a task, or replace the row with the same local id.
    ///
    /// # Returns
    /// The local id of the stored row
    pub async fn upsert<C>(conn: &C, user_id: &str, task: &Task) -> Result<i64>
    where
        C: ConnectionTrait,
    {
        let mut model = Self::to_active_model(task, user_id);

        match task.local_id {
            Some(local_id) => {
                model.local_id = ActiveValue::Set(local_id);
                task::Entity::insert(model)
                    .on_conflict(
                        OnConflict::column(task::Column::LocalId)
                            .update_columns(UPSERT_COLUMNS)
                            .to_owned(),
                    )
                    .exec(conn)
                    .await?;
                Ok(local_id)
            }
            None => {
                let inserted = task::Entity::insert(model).exec(conn).await?;
                Ok(inserted.last_insert_id)
            }
        }
    }

    /// Upsert many tasks in one transaction.
    pub async fn upsert_all(db: &DatabaseConnection, user_id: &str, tasks: &[Task]) -> Result<Vec<i64>> {
        let txn = db.begin().await?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(Self::upsert(&txn, user_id, task).await?);
        }
        txn.commit().await?;
        Ok(ids)
    }

    /// Make the user's cached rows mirror `tasks`.
    ///
    /// Rows whose remote id is already cached keep their local id; rows the
    /// list no longer contains are removed.
    ///
    /// # Returns
    /// The user's tasks in cache order
    pub async fn replace_for_user(db: &DatabaseConnection, user_id: &str, tasks: &[Task]) -> Result<Vec<Task>> {
        let txn = db.begin().await?;

        let known: HashMap<String, i64> = task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .all(&txn)
            .await?
            .into_iter()
            .filter_map(|model| model.remote_id.map(|remote_id| (remote_id, model.local_id)))
            .collect();

        let mut kept = HashSet::with_capacity(tasks.len());
        for task in tasks {
            let mut task = task.clone();
            task.local_id = task.remote_id.as_ref().and_then(|remote_id| known.get(remote_id).copied());
            kept.insert(Self::upsert(&txn, user_id, &task).await?);
        }

        task::Entity::delete_many()
            .filter(task::Column::UserId.eq(user_id))
            .filter(task::Column::LocalId.is_not_in(kept))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Self::list_by_user(db, user_id).await
    }

    /// Delete the user's row matching either identifier.
    ///
    /// # Returns
    /// Number of deleted rows
    pub async fn delete_by_remote_or_local_id<C>(
        conn: &C,
        user_id: &str,
        remote_id: Option<&str>,
        local_id: Option<i64>,
    ) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        if remote_id.is_none() && local_id.is_none() {
            return Ok(0);
        }

        let matches = Condition::any()
            .add_option(remote_id.map(|id| task::Column::RemoteId.eq(id)))
            .add_option(local_id.map(|id| task::Column::LocalId.eq(id)));

        let result = task::Entity::delete_many()
            .filter(task::Column::UserId.eq(user_id))
            .filter(matches)
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Remove every cached task of a user.
    pub async fn clear_for_user<C>(conn: &C, user_id: &str) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        let result = task::Entity::delete_many()
            .filter(task::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    fn to_domain(model: task::Model) -> Task {
        Task {
            remote_id: model.remote_id,
            local_id: Some(model.local_id),
            title: model.title,
            priority: model.priority.parse().unwrap_or_default(),
            completed: model.completed,
            all_day: model.all_day,
            start_time: model.start_time.and_then(datetime::from_millis),
            end_time: model.end_time.and_then(datetime::from_millis),
            location: model.location,
            reminder_offset_minutes: model.reminder_offset_minutes,
            user_id: Some(model.user_id),
            fcm_token: model.fcm_token,
        }
    }

    fn to_active_model(task: &Task, user_id: &str) -> task::ActiveModel {
        task::ActiveModel {
            local_id: ActiveValue::NotSet,
            remote_id: ActiveValue::Set(task.remote_id.clone()),
            user_id: ActiveValue::Set(user_id.to_string()),
            title: ActiveValue::Set(task.title.clone()),
            priority: ActiveValue::Set(task.priority.as_str().to_string()),
            completed: ActiveValue::Set(task.completed),
            all_day: ActiveValue::Set(task.all_day),
            start_time: ActiveValue::Set(task.start_time.map(datetime::to_millis)),
            end_time: ActiveValue::Set(task.end_time.map(datetime::to_millis)),
            location: ActiveValue::Set(task.location.clone()),
            reminder_offset_minutes: ActiveValue::Set(task.reminder_offset_minutes),
            fcm_token: ActiveValue::Set(task.fcm_token.clone()),
        }
    }
}
