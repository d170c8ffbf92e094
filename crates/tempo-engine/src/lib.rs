pub mod config;
pub mod engine;
pub mod insights;
pub mod llm;
pub mod notifier;
