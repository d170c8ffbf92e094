use anyhow::{bail, Context, Result};
use chrono::DateTime;

use super::server::api_base_url;

pub async fn add(
    title: &str,
    due: &str,
    priority: Option<&str>,
    desc: Option<&str>,
    config_path: &str,
) -> Result<()> {
    // Fail fast on a bad date instead of round-tripping to the server.
    DateTime::parse_from_rfc3339(due)
        .with_context(|| format!("--due must be RFC3339, got {due}"))?;

    let mut body = serde_json::json!({ "title": title, "due_at": due });
    if let Some(priority) = priority {
        body["priority"] = serde_json::json!(priority);
    }
    if let Some(desc) = desc {
        body["description"] = serde_json::json!(desc);
    }

    let url = format!("{}/tasks", api_base_url(config_path)?);
    let client = reqwest::Client::new();
    let resp = client.post(&url).json(&body).send().await?;
    if !resp.status().is_success() {
        bail!("create failed (HTTP {}): {}", resp.status(), resp.text().await?);
    }

    let task: serde_json::Value = resp.json().await?;
    println!("created task {}", field(&task, "id"));
    print_task(&task);
    Ok(())
}

pub async fn list(status: Option<&str>, priority: Option<&str>, config_path: &str) -> Result<()> {
    let mut url = format!("{}/tasks", api_base_url(config_path)?);
    let mut params = Vec::new();
    if let Some(status) = status {
        params.push(format!("status={status}"));
    }
    if let Some(priority) = priority {
        params.push(format!("priority={priority}"));
    }
    if !params.is_empty() {
        url = format!("{url}?{}", params.join("&"));
    }

    let client = reqwest::Client::new();
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        bail!("list failed (HTTP {}): {}", resp.status(), resp.text().await?);
    }

    let tasks: Vec<serde_json::Value> = resp.json().await?;
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    println!("{} task(s):", tasks.len());
    for task in &tasks {
        print_task(task);
    }
    Ok(())
}

pub async fn complete(id: &str, config_path: &str) -> Result<()> {
    let url = format!("{}/tasks/{id}/status", api_base_url(config_path)?);
    let client = reqwest::Client::new();
    let resp = client
        .patch(&url)
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await?;
    if !resp.status().is_success() {
        bail!(
            "complete failed (HTTP {}): {}",
            resp.status(),
            resp.text().await?
        );
    }

    let task: serde_json::Value = resp.json().await?;
    println!("completed task {}", field(&task, "id"));
    print_task(&task);
    Ok(())
}

fn print_task(task: &serde_json::Value) {
    println!(
        "  [{}] {} (priority: {}, due: {})",
        field(task, "status"),
        field(task, "title"),
        field(task, "priority"),
        field(task, "due_at"),
    );
}

fn field<'a>(task: &'a serde_json::Value, key: &str) -> &'a str {
    task.get(key).and_then(|v| v.as_str()).unwrap_or("?")
}
