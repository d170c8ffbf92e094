use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_at: DateTime<Utc>,
    /// Set when a due-soon alert for the current due date has been emitted.
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            due_at,
            reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.due_at < now
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            title: self.title.clone(),
            priority: self.priority,
            status: self.status,
            due_at: self.due_at,
        }
    }
}

/// Compact task view carried inside notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Priority / Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("unknown task status: {s}")),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Notification Settings (singleton)
// ---------------------------------------------------------------------------

pub const REMINDER_MINUTES_MIN: u32 = 5;
pub const REMINDER_MINUTES_MAX: u32 = 180;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub high_priority: bool,
    pub medium_priority: bool,
    pub low_priority: bool,
    /// Lead time before the deadline, in minutes. Bounded 5..=180.
    pub reminder_minutes: u32,
    pub updated_at: DateTime<Utc>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            high_priority: true,
            medium_priority: true,
            low_priority: false,
            reminder_minutes: 60,
            updated_at: Utc::now(),
        }
    }
}

impl NotificationSettings {
    pub fn allows(&self, priority: Priority) -> bool {
        if !self.enabled {
            return false;
        }
        match priority {
            Priority::High => self.high_priority,
            Priority::Medium => self.medium_priority,
            Priority::Low => self.low_priority,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(REMINDER_MINUTES_MIN..=REMINDER_MINUTES_MAX).contains(&self.reminder_minutes) {
            return Err(format!(
                "reminder_minutes must be between {REMINDER_MINUTES_MIN} and {REMINDER_MINUTES_MAX}, got {}",
                self.reminder_minutes
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fan-out payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskDueSoon,
    OverdueTasks,
    Test,
}

/// Notification delivered to subscribers (WebSocket, webhooks). Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_until_due: Option<i64>,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn due_soon(task: &Task, minutes_until_due: i64) -> Self {
        Self {
            kind: NotificationKind::TaskDueSoon,
            title: "Task due soon".to_string(),
            message: format!(
                "\"{}\" is due in {} minute{}",
                task.title,
                minutes_until_due,
                if minutes_until_due == 1 { "" } else { "s" }
            ),
            task: Some(task.summary()),
            tasks: Vec::new(),
            priority: Some(task.priority),
            minutes_until_due: Some(minutes_until_due),
            sent_at: Utc::now(),
        }
    }

    pub fn overdue(tasks: Vec<TaskSummary>) -> Self {
        let count = tasks.len();
        Self {
            kind: NotificationKind::OverdueTasks,
            title: "Overdue tasks".to_string(),
            message: format!(
                "You have {count} overdue task{}",
                if count == 1 { "" } else { "s" }
            ),
            task: None,
            tasks,
            priority: None,
            minutes_until_due: None,
            sent_at: Utc::now(),
        }
    }

    pub fn test() -> Self {
        Self {
            kind: NotificationKind::Test,
            title: "Test notification".to_string(),
            message: "Notifications are working".to_string(),
            task: None,
            tasks: Vec::new(),
            priority: None,
            minutes_until_due: None,
            sent_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusUpdated,
}

/// Change event broadcast after every task mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind, task_id: Uuid, task: Option<Task>) -> Self {
        Self {
            kind,
            task_id: task_id.to_string(),
            task,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Query filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn task_defaults() {
        let due = Utc::now() + Duration::hours(2);
        let task = Task::new("write report", due);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.description, "");
        assert!(task.reminder_sent_at.is_none());
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn priority_round_trips_through_strings() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_serde_uses_snake_case() {
        let json = serde_json::to_value(Priority::High).unwrap();
        assert_eq!(json, "high");
        let status: TaskStatus = serde_json::from_value(serde_json::json!("completed")).unwrap();
        assert_eq!(status, TaskStatus::Completed);
    }

    #[test]
    fn overdue_only_when_pending_and_past_due() {
        let now = Utc::now();
        let mut task = Task::new("t", now - Duration::hours(1));
        assert!(task.is_overdue(now));
        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(now));
        let future = Task::new("t", now + Duration::hours(1));
        assert!(!future.is_overdue(now));
    }

    #[test]
    fn settings_defaults_and_gating() {
        let settings = NotificationSettings::default();
        assert!(settings.enabled);
        assert!(settings.allows(Priority::High));
        assert!(settings.allows(Priority::Medium));
        assert!(!settings.allows(Priority::Low));
        assert_eq!(settings.reminder_minutes, 60);

        let disabled = NotificationSettings {
            enabled: false,
            ..NotificationSettings::default()
        };
        assert!(!disabled.allows(Priority::High));
    }

    #[test]
    fn settings_reminder_bounds() {
        let mut settings = NotificationSettings::default();
        settings.reminder_minutes = 4;
        assert!(settings.validate().is_err());
        settings.reminder_minutes = 181;
        assert!(settings.validate().is_err());
        settings.reminder_minutes = 5;
        assert!(settings.validate().is_ok());
        settings.reminder_minutes = 180;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn due_soon_notification_message_pluralizes() {
        let task = Task::new("ship release", Utc::now() + Duration::minutes(30));
        let n = Notification::due_soon(&task, 30);
        assert_eq!(n.kind, NotificationKind::TaskDueSoon);
        assert!(n.message.contains("30 minutes"));
        let n1 = Notification::due_soon(&task, 1);
        assert!(n1.message.ends_with("1 minute"));
    }

    #[test]
    fn task_event_serializes_with_snake_case_kind() {
        let task = Task::new("t", Utc::now());
        let event = TaskEvent::new(TaskEventKind::TaskStatusUpdated, task.id, Some(task));
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["kind"], "task_status_updated");
        assert!(json["task"]["title"].is_string());
    }
}
