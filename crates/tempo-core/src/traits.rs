use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TempoResult;
use crate::model::*;

/// Storage backend for tasks and the notification-settings singleton.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: &Task) -> TempoResult<()>;
    async fn get(&self, id: Uuid) -> TempoResult<Option<Task>>;
    async fn update(&self, task: &Task) -> TempoResult<()>;
    async fn delete(&self, id: Uuid) -> TempoResult<bool>;
    async fn list(
        &self,
        filters: &TaskFilters,
        limit: usize,
        offset: usize,
    ) -> TempoResult<Vec<Task>>;
    async fn count(&self, filters: &TaskFilters) -> TempoResult<usize>;

    /// Pending tasks with `after < due_at <= until` for one priority.
    async fn list_due_between(
        &self,
        priority: Priority,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> TempoResult<Vec<Task>>;

    /// Pending tasks past their due date, oldest first.
    async fn list_overdue(&self, now: DateTime<Utc>) -> TempoResult<Vec<Task>>;

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> TempoResult<()>;
    async fn clear_reminder(&self, id: Uuid) -> TempoResult<()>;

    /// The settings row is a singleton: reads create the default record.
    async fn get_or_create_settings(&self) -> TempoResult<NotificationSettings>;
    async fn update_settings(&self, settings: &NotificationSettings) -> TempoResult<()>;
}
