use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_dir: String,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: shellexpand("~/.tempo/data"),
            notifier: NotifierConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Apply environment overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("TEMPO_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = shellexpand(&dir);
            }
        }
        if let Ok(url) = std::env::var("TEMPO_LLM_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.base_url = url;
                self.llm.enabled = true;
            }
        }
        if let Ok(model) = std::env::var("TEMPO_LLM_MODEL") {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
    }
}

/// Configuration for the due-date notification scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Whether the background scheduler runs at all.
    pub enabled: bool,
    /// Interval between scheduler ticks in seconds.
    pub interval_secs: u64,
    /// Due-soon window for high-priority tasks, in minutes.
    pub high_window_minutes: i64,
    /// Due-soon window for medium-priority tasks, in minutes.
    pub medium_window_minutes: i64,
    /// Due-soon window for low-priority tasks, in minutes.
    pub low_window_minutes: i64,
    /// Local hour (0-23) at which the overdue sweep runs.
    pub end_of_day_hour: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            high_window_minutes: 60,
            medium_window_minutes: 120,
            low_window_minutes: 180,
            end_of_day_hour: 17,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:11434/v1".into(),
            model: "llama3.2".into(),
            max_tokens: 512,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

fn shellexpand(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    s.to_string()
}
