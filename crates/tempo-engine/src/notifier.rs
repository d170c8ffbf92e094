use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use tracing::debug;

use tempo_core::{Notification, NotificationSettings, Priority, TaskStore, TempoResult};

use crate::config::NotifierConfig;

/// Mutable scheduler state carried across ticks.
#[derive(Debug, Default)]
pub struct NotifierState {
    /// Calendar date (local) of the last overdue sweep. At most one sweep
    /// runs per day.
    pub last_sweep_date: Option<NaiveDate>,
}

/// Due-soon window for a priority, in minutes.
pub fn window_minutes(config: &NotifierConfig, priority: Priority) -> i64 {
    match priority {
        Priority::High => config.high_window_minutes,
        Priority::Medium => config.medium_window_minutes,
        Priority::Low => config.low_window_minutes,
    }
}

/// One scheduler tick: the due-soon pass plus, when the local clock has
/// entered the end-of-day hour, the overdue sweep.
///
/// `now_local_hour` and `today_local` come from the caller's local clock so
/// the decision logic stays testable.
pub async fn run_tick(
    store: &dyn TaskStore,
    config: &NotifierConfig,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
    now_local_hour: u32,
    today_local: NaiveDate,
    state: &mut NotifierState,
) -> TempoResult<Vec<Notification>> {
    let mut notifications = due_soon_pass(store, config, settings, now).await?;

    if should_run_overdue_sweep(config, now_local_hour, today_local, state) {
        state.last_sweep_date = Some(today_local);
        if let Some(notification) = overdue_sweep(store, settings, now).await? {
            notifications.push(notification);
        }
    }

    Ok(notifications)
}

/// Emit a due-soon alert for each pending task entering its priority
/// window, at most once per task until its reminder state is re-armed.
pub async fn due_soon_pass(
    store: &dyn TaskStore,
    config: &NotifierConfig,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> TempoResult<Vec<Notification>> {
    let mut notifications = Vec::new();
    if !settings.enabled {
        return Ok(notifications);
    }

    for priority in [Priority::High, Priority::Medium, Priority::Low] {
        if !settings.allows(priority) {
            continue;
        }
        let window = Duration::minutes(window_minutes(config, priority));
        let due = store.list_due_between(priority, now, now + window).await?;

        for task in due {
            if task.reminder_sent_at.is_some() {
                continue;
            }
            let minutes_until_due = ((task.due_at - now).num_seconds() as f64 / 60.0).round() as i64;
            let mut notification = Notification::due_soon(&task, minutes_until_due);
            // Inside the configured lead time the alert is a reminder, not
            // just a window entry.
            if minutes_until_due <= settings.reminder_minutes as i64 {
                notification.title = "Task reminder".to_string();
            }
            store.mark_reminder_sent(task.id, now).await?;
            debug!(task_id = %task.id, minutes_until_due, priority = %priority, "due-soon alert");
            notifications.push(notification);
        }
    }

    Ok(notifications)
}

/// The sweep runs once the local clock reaches the end-of-day hour, and at
/// most once per calendar date.
pub fn should_run_overdue_sweep(
    config: &NotifierConfig,
    now_local_hour: u32,
    today_local: NaiveDate,
    state: &NotifierState,
) -> bool {
    now_local_hour == config.end_of_day_hour && state.last_sweep_date != Some(today_local)
}

/// Collect pending tasks past their due date into one summary notification.
/// Returns `None` when there is nothing overdue or the global toggle is off.
pub async fn overdue_sweep(
    store: &dyn TaskStore,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> TempoResult<Option<Notification>> {
    if !settings.enabled {
        return Ok(None);
    }
    let overdue = store.list_overdue(now).await?;
    if overdue.is_empty() {
        return Ok(None);
    }
    let summaries = overdue.iter().map(|t| t.summary()).collect();
    Ok(Some(Notification::overdue(summaries)))
}

/// The current local hour and date, as `run_tick` expects them.
pub fn local_clock() -> (u32, NaiveDate) {
    let now_local = chrono::Local::now();
    (now_local.hour(), now_local.date_naive())
}
