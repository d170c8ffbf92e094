pub mod server;
pub mod task;

use anyhow::Context;
use serde::Deserialize;
use tempo_engine::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    pub bind_host: String,
    pub rest_port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            rest_port: 8080,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub server: ServerRuntimeConfig,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<FileServerConfig>,
    storage: Option<FileStorageConfig>,
    notifier: Option<FileNotifierConfig>,
    llm: Option<FileLlmConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServerConfig {
    bind_host: Option<String>,
    rest_port: Option<u16>,
    cors_allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct FileStorageConfig {
    data_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileNotifierConfig {
    enabled: Option<bool>,
    interval_secs: Option<u64>,
    high_window_minutes: Option<i64>,
    medium_window_minutes: Option<i64>,
    low_window_minutes: Option<i64>,
    end_of_day_hour: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlmConfig {
    enabled: Option<bool>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

/// Load config from `config_path` (expanding ~), overlay it on the defaults,
/// then apply environment overrides. A missing file is not an error.
pub fn load_runtime_config(config_path: &str) -> anyhow::Result<RuntimeConfig> {
    let path = shellexpand(config_path);

    let mut engine = EngineConfig::default();
    let mut server = ServerRuntimeConfig::default();

    if std::path::Path::new(&path).exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let file_config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse TOML config {path}"))?;

        if let Some(file_server) = file_config.server {
            if let Some(bind_host) = file_server.bind_host {
                server.bind_host = bind_host;
            }
            if let Some(rest_port) = file_server.rest_port {
                server.rest_port = rest_port;
            }
            if let Some(origins) = file_server.cors_allowed_origins {
                server.cors_allowed_origins = origins;
            }
        }

        if let Some(storage) = file_config.storage {
            if let Some(data_dir) = storage.data_dir {
                engine.data_dir = shellexpand(&data_dir);
            }
        }

        if let Some(notifier) = file_config.notifier {
            if let Some(enabled) = notifier.enabled {
                engine.notifier.enabled = enabled;
            }
            if let Some(interval_secs) = notifier.interval_secs {
                engine.notifier.interval_secs = interval_secs;
            }
            if let Some(high) = notifier.high_window_minutes {
                engine.notifier.high_window_minutes = high;
            }
            if let Some(medium) = notifier.medium_window_minutes {
                engine.notifier.medium_window_minutes = medium;
            }
            if let Some(low) = notifier.low_window_minutes {
                engine.notifier.low_window_minutes = low;
            }
            if let Some(hour) = notifier.end_of_day_hour {
                engine.notifier.end_of_day_hour = hour;
            }
        }

        if let Some(llm) = file_config.llm {
            if let Some(enabled) = llm.enabled {
                engine.llm.enabled = enabled;
            }
            if let Some(base_url) = llm.base_url {
                engine.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                engine.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                engine.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                engine.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                engine.llm.timeout_secs = timeout_secs;
            }
        }
    }

    engine.apply_env();
    Ok(RuntimeConfig { engine, server })
}

pub fn shellexpand(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    s.to_string()
}
