use anyhow::{Context, Result};
use std::sync::Arc;

use rafta_remote::auth::{
    AuthGateway, BasicCredential, CredentialManager, ExpiryParser, HttpAuthGateway,
};
use rafta_remote::client::RaftaClient;
use rafta_remote::config::{Command, Config, LogFormat};
use rafta_remote::http_client::build_client;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::debug!(
        "Rafta server: {} (user: {})",
        config.endpoint.base_url(),
        config.username
    );

    let http = build_client(config.http_connect_timeout, config.http_request_timeout)?;
    let base_url = config.endpoint.base_url();

    let parser = match config.token_secret {
        Some(ref secret) => ExpiryParser::with_hs256_secret(secret.as_bytes()),
        None => {
            tracing::warn!(
                "RAFTA_TOKEN_SECRET not set: token expiry claims are trusted without signature verification"
            );
            ExpiryParser::new()
        }
    };

    let gateway: Arc<dyn AuthGateway> =
        Arc::new(HttpAuthGateway::new(http.clone(), base_url.clone()));
    let credentials = CredentialManager::from_parts(
        Some(gateway),
        BasicCredential::new(config.username.clone(), config.password.clone()),
        parser,
    );

    let client = RaftaClient::new(http, base_url, credentials.clone());

    let output = match run(&config.command, &client, &credentials).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run one remote operation and return its JSON result
async fn run(
    command: &Command,
    client: &RaftaClient,
    credentials: &CredentialManager,
) -> Result<serde_json::Value> {
    let value = match command {
        Command::Token => {
            let token = credentials
                .bearer_token()
                .await
                .context("Failed to obtain a bearer token")?;
            let expires_at = credentials.cached_access().map(|t| t.expires_at().to_rfc3339());

            tracing::info!(
                "✅ Authenticated as {} (token: {}...)",
                credentials.username(),
                token.chars().take(12).collect::<String>()
            );

            serde_json::json!({
                "user": credentials.username(),
                "expires_at": expires_at,
            })
        }
        Command::Tasks => client.get_all_tasks().await?,
        Command::Task { id } => client.get_task(id).await?,
        Command::Whoami => client.get_user_info().await?,
        Command::NewTask { json } => client.new_task(parse_json(json)?).await?,
        Command::UpdateTask { json } => client.update_task(parse_json(json)?).await?,
        Command::DeleteTask { id } => client.delete_task(id).await?,
    };

    Ok(value)
}

fn parse_json(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("Argument is not valid JSON")
}

/// Logs go to stderr; stdout carries command output only
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_file(true).with_line_number(true).init(),
    }
}
