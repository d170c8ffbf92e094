use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use tempo_core::*;
use tempo_storage::SqliteTaskStore;

use crate::config::EngineConfig;
use crate::llm::{init_llm_provider, LlmProvider};

const MAX_TITLE_LEN: usize = 500;

/// Fields accepted when creating a task.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_at: DateTime<Utc>,
}

/// Full-update payload. All fields are applied.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_at: DateTime<Utc>,
}

/// The Tempo engine — orchestrates storage, scheduling decisions, and the
/// optional LLM provider.
pub struct TaskEngine {
    pub store: Arc<dyn TaskStore>,
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub config: EngineConfig,
}

impl TaskEngine {
    /// Open the on-disk store under `config.data_dir` and build the engine.
    pub fn init(config: EngineConfig) -> TempoResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| TempoError::Config(format!("failed to create data dir: {e}")))?;
        let db_path = std::path::Path::new(&config.data_dir).join("tasks.sqlite");
        let store = SqliteTaskStore::open(&db_path)?;
        info!(path = %db_path.display(), "task store opened");

        let llm = init_llm_provider(&config.llm);
        Ok(Self {
            store: Arc::new(store),
            llm,
            config,
        })
    }

    /// Build an engine over an existing store. Used by tests.
    pub fn with_store(store: Arc<dyn TaskStore>, config: EngineConfig) -> Self {
        let llm = init_llm_provider(&config.llm);
        Self { store, llm, config }
    }

    pub async fn create_task(&self, draft: CreateTask) -> TempoResult<Task> {
        let title = validate_title(&draft.title)?;
        let mut task = Task::new(title, draft.due_at);
        if let Some(description) = draft.description {
            task.description = description;
        }
        if let Some(priority) = draft.priority {
            task.priority = priority;
        }
        self.store.insert(&task).await?;
        Ok(task)
    }

    pub async fn get_task(&self, id: Uuid) -> TempoResult<Task> {
        self.store
            .get(id)
            .await?
            .ok_or(TempoError::TaskNotFound(id))
    }

    /// Full update. Moving the due date re-arms the reminder.
    pub async fn update_task(&self, id: Uuid, update: UpdateTask) -> TempoResult<Task> {
        let mut task = self.get_task(id).await?;
        let title = validate_title(&update.title)?;

        if update.due_at != task.due_at {
            task.reminder_sent_at = None;
        }
        task.title = title;
        task.description = update.description;
        task.priority = update.priority;
        task.status = update.status;
        task.due_at = update.due_at;
        task.updated_at = Utc::now();

        self.store.update(&task).await?;
        Ok(task)
    }

    /// Status transitions clear reminder state in both directions: completing
    /// cancels a pending alert, reopening re-arms it.
    pub async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> TempoResult<Task> {
        let mut task = self.get_task(id).await?;
        if task.status != status {
            task.reminder_sent_at = None;
        }
        task.status = status;
        task.updated_at = Utc::now();
        self.store.update(&task).await?;
        Ok(task)
    }

    pub async fn delete_task(&self, id: Uuid) -> TempoResult<bool> {
        self.store.delete(id).await
    }

    pub async fn list_tasks(
        &self,
        filters: &TaskFilters,
        limit: usize,
        offset: usize,
    ) -> TempoResult<Vec<Task>> {
        self.store.list(filters, limit, offset).await
    }

    pub async fn task_count(&self) -> TempoResult<usize> {
        self.store.count(&TaskFilters::default()).await
    }

    /// Pending tasks due before `before`, oldest first.
    pub async fn due_tasks(&self, before: DateTime<Utc>) -> TempoResult<Vec<Task>> {
        self.store.list_overdue(before).await
    }

    /// Re-arm a task's reminder, optionally pushing the due date forward.
    pub async fn snooze_reminder(&self, id: Uuid, minutes: Option<i64>) -> TempoResult<Task> {
        let mut task = self.get_task(id).await?;
        if let Some(minutes) = minutes {
            if minutes <= 0 {
                return Err(TempoError::InvalidInput(
                    "snooze minutes must be positive".into(),
                ));
            }
            task.due_at += Duration::minutes(minutes);
            task.updated_at = Utc::now();
        }
        task.reminder_sent_at = None;
        self.store.update(&task).await?;
        Ok(task)
    }

    pub async fn notification_settings(&self) -> TempoResult<NotificationSettings> {
        self.store.get_or_create_settings().await
    }

    pub async fn update_settings(
        &self,
        mut settings: NotificationSettings,
    ) -> TempoResult<NotificationSettings> {
        settings.validate().map_err(TempoError::InvalidInput)?;
        settings.updated_at = Utc::now();
        self.store.update_settings(&settings).await?;
        Ok(settings)
    }
}

fn validate_title(title: &str) -> TempoResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TempoError::InvalidInput("title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(TempoError::InvalidInput(format!(
            "title exceeds {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TaskEngine {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        TaskEngine::with_store(Arc::new(store), EngineConfig::default())
    }

    fn draft(title: &str) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            description: None,
            priority: None,
            due_at: Utc::now() + Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_trims_title() {
        let engine = engine();
        let task = engine.create_task(draft("  ship it  ")).await.unwrap();
        assert_eq!(task.title, "ship it");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn create_rejects_blank_and_oversized_titles() {
        let engine = engine();
        let err = engine.create_task(draft("   ")).await.unwrap_err();
        assert!(matches!(err, TempoError::InvalidInput(_)));

        let long = "x".repeat(501);
        let err = engine.create_task(draft(&long)).await.unwrap_err();
        assert!(matches!(err, TempoError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn get_missing_task_is_not_found() {
        let engine = engine();
        let err = engine.get_task(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, TempoError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn update_moving_due_date_rearms_reminder() {
        let engine = engine();
        let task = engine.create_task(draft("t")).await.unwrap();
        engine
            .store
            .mark_reminder_sent(task.id, Utc::now())
            .await
            .unwrap();

        let moved = engine
            .update_task(
                task.id,
                UpdateTask {
                    title: task.title.clone(),
                    description: task.description.clone(),
                    priority: task.priority,
                    status: task.status,
                    due_at: task.due_at + Duration::hours(1),
                },
            )
            .await
            .unwrap();
        assert!(moved.reminder_sent_at.is_none());
        assert!(moved.updated_at > task.updated_at);
    }

    #[tokio::test]
    async fn update_keeping_due_date_preserves_reminder() {
        let engine = engine();
        let task = engine.create_task(draft("t")).await.unwrap();
        let sent_at = Utc::now();
        engine
            .store
            .mark_reminder_sent(task.id, sent_at)
            .await
            .unwrap();

        let updated = engine
            .update_task(
                task.id,
                UpdateTask {
                    title: "renamed".to_string(),
                    description: task.description.clone(),
                    priority: Priority::High,
                    status: task.status,
                    due_at: task.due_at,
                },
            )
            .await
            .unwrap();
        assert!(updated.reminder_sent_at.is_some());
        assert_eq!(updated.title, "renamed");
    }

    #[tokio::test]
    async fn status_transitions_clear_reminder_state() {
        let engine = engine();
        let task = engine.create_task(draft("t")).await.unwrap();
        engine
            .store
            .mark_reminder_sent(task.id, Utc::now())
            .await
            .unwrap();

        let completed = engine
            .set_task_status(task.id, TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert!(completed.reminder_sent_at.is_none());
    }

    #[tokio::test]
    async fn snooze_pushes_due_date_and_rearms() {
        let engine = engine();
        let task = engine.create_task(draft("t")).await.unwrap();
        engine
            .store
            .mark_reminder_sent(task.id, Utc::now())
            .await
            .unwrap();

        let snoozed = engine.snooze_reminder(task.id, Some(15)).await.unwrap();
        assert!(snoozed.reminder_sent_at.is_none());
        assert_eq!(snoozed.due_at, task.due_at + Duration::minutes(15));

        let err = engine.snooze_reminder(task.id, Some(0)).await.unwrap_err();
        assert!(matches!(err, TempoError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn settings_update_validates_bounds() {
        let engine = engine();
        let mut settings = engine.notification_settings().await.unwrap();
        settings.reminder_minutes = 200;
        let err = engine.update_settings(settings.clone()).await.unwrap_err();
        assert!(matches!(err, TempoError::InvalidInput(_)));

        settings.reminder_minutes = 30;
        let saved = engine.update_settings(settings).await.unwrap();
        assert_eq!(saved.reminder_minutes, 30);
        let fetched = engine.notification_settings().await.unwrap();
        assert_eq!(fetched.reminder_minutes, 30);
    }
}
