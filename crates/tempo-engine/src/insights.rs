use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tempo_core::{Priority, Task, TaskStatus};

use crate::llm::{ChatMessage, CompletionParams, LlmError, LlmProvider};

/// AI analysis of a task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInsights {
    pub workload_analysis: String,
    pub scheduling_suggestions: String,
    pub productivity_tips: String,
}

// ---------------------------------------------------------------------------
// Heuristic analyser
// ---------------------------------------------------------------------------

/// Generate insights from simple status/priority/overdue counts.
///
/// Used directly when no LLM provider is configured, and as the fallback
/// when the provider errors.
pub fn heuristic_insights(tasks: &[Task], now: DateTime<Utc>) -> TaskInsights {
    let total = tasks.len();
    let pending = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .count();
    let completed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(now)).count();
    let high = tasks.iter().filter(|t| t.priority == Priority::High).count();
    let medium = tasks
        .iter()
        .filter(|t| t.priority == Priority::Medium)
        .count();
    let low = tasks.iter().filter(|t| t.priority == Priority::Low).count();

    TaskInsights {
        workload_analysis: format!(
            "You have {total} tasks in total: {pending} pending, {completed} completed. \
             {overdue} tasks are overdue. Priority distribution: {high} high, \
             {medium} medium, {low} low priority tasks."
        ),
        scheduling_suggestions: format!(
            "Focus on the {overdue} overdue tasks first. {high} high-priority tasks \
             need immediate attention. Consider breaking down large tasks into smaller, \
             manageable pieces. Schedule regular check-ins to update task progress."
        ),
        productivity_tips: "Maintain a balanced workload by tackling high-priority tasks \
             during your peak productivity hours. Take short breaks between tasks to stay \
             focused. Review and update task priorities daily. Consider using time-blocking \
             techniques to improve focus and productivity."
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// LLM analyser
// ---------------------------------------------------------------------------

/// Ask the LLM for insights over the task list.
///
/// The reply must be a JSON object with `workload_analysis`,
/// `scheduling_suggestions`, and `productivity_tips` keys; anything else is
/// a parse error and the caller falls back to the heuristic.
pub async fn llm_insights(
    llm: &dyn LlmProvider,
    tasks: &[Task],
) -> Result<TaskInsights, LlmError> {
    let task_lines: Vec<String> = tasks
        .iter()
        .map(|t| {
            format!(
                "- \"{}\" (priority: {}, status: {}, due: {})",
                t.title,
                t.priority,
                t.status,
                t.due_at.to_rfc3339()
            )
        })
        .collect();

    let messages = vec![
        ChatMessage::system(
            "You are a productivity assistant analyzing a task list. \
             Consider priorities, deadlines, workload distribution, and potential \
             bottlenecks. Respond with ONLY a JSON object with exactly these keys: \
             \"workload_analysis\", \"scheduling_suggestions\", \"productivity_tips\". \
             Each value is a short paragraph of specific, actionable advice.",
        ),
        ChatMessage::user(format!(
            "Analyze these tasks:\n{}",
            task_lines.join("\n")
        )),
    ];

    let reply = llm.complete(&messages, &CompletionParams::default()).await?;
    parse_insights_reply(&reply)
}

fn parse_insights_reply(reply: &str) -> Result<TaskInsights, LlmError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).map_err(|e| LlmError::ParseError(e.to_string()))
}

/// Models often wrap JSON answers in markdown fences; strip them.
fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
