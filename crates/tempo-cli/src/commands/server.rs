use anyhow::Result;

pub async fn serve(port: Option<u16>, config_path: &str) -> Result<()> {
    let runtime = super::load_runtime_config(config_path)?;

    let bind_host = runtime.server.bind_host.clone();
    let rest_port = port.unwrap_or(runtime.server.rest_port);

    let server_config = tempo_server::ServerConfig {
        bind_host: bind_host.clone(),
        rest_port,
        cors_allowed_origins: runtime.server.cors_allowed_origins,
        engine_config: runtime.engine,
    };

    println!("starting Tempo server...");
    println!("  REST: http://{bind_host}:{rest_port}");

    tempo_server::start_server(server_config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}

pub async fn status(config_path: &str) -> Result<()> {
    let url = health_url(config_path)?;

    let client = reqwest::Client::new();
    match client.get(&url).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                let body: serde_json::Value = resp.json().await?;
                println!("status: running");
                println!("  endpoint: {url}");
                if let Some(count) = body.get("task_count") {
                    println!("  tasks: {count}");
                }
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    println!("  version: {version}");
                }
            } else {
                println!("status: error (HTTP {})", resp.status());
                println!("  endpoint: {url}");
            }
        }
        Err(_) => {
            println!("status: stopped");
            println!("  endpoint: {url}");
        }
    }
    Ok(())
}

pub fn api_base_url(config_path: &str) -> Result<String> {
    let runtime = super::load_runtime_config(config_path)?;
    let host = local_rest_host(&runtime.server.bind_host);
    Ok(format!(
        "http://{host}:{}/api/v1",
        runtime.server.rest_port
    ))
}

fn health_url(config_path: &str) -> Result<String> {
    Ok(format!("{}/health", api_base_url(config_path)?))
}

fn local_rest_host(bind_host: &str) -> &str {
    if bind_host == "0.0.0.0" {
        "127.0.0.1"
    } else {
        bind_host
    }
}
