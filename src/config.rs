use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::http_client::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};

/// Rafta remote client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Rafta server host
    #[arg(short = 'H', long, env = "RAFTA_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Rafta server port
    #[arg(short, long, env = "RAFTA_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Use plaintext HTTP instead of TLS
    #[arg(long, env = "RAFTA_INSECURE", default_value = "false")]
    pub insecure: bool,

    /// Account username
    #[arg(short, long, env = "RAFTA_USER")]
    pub user: Option<String>,

    /// Account password
    #[arg(long, env = "RAFTA_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// HS256 secret used to verify access token signatures
    #[arg(long, env = "RAFTA_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Remote operation to run
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Acquire a bearer token and report its expiry
    Token,
    /// List every task of the account
    Tasks,
    /// Show one task
    Task { id: String },
    /// Show the account's user information
    Whoami,
    /// Create a task from a JSON document
    NewTask { json: String },
    /// Update a task from a JSON document
    UpdateTask { json: String },
    /// Delete one task
    DeleteTask { id: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server
    pub endpoint: Endpoint,

    // Credentials
    pub username: String,
    pub password: String,
    pub token_secret: Option<String>,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,

    pub command: Command,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Config {
            endpoint: Endpoint::new(args.host, args.port, args.insecure),

            username: args
                .user
                .context("RAFTA_USER is required (use -u or set RAFTA_USER env var)")?,

            password: args
                .password
                .context("RAFTA_PASS is required (use --password or set RAFTA_PASS env var)")?,

            token_secret: args.token_secret.filter(|s| !s.is_empty()),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),

            command: args.command.unwrap_or(Command::Token),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.trim().is_empty() {
            anyhow::bail!("RAFTA_HOST cannot be empty");
        }

        if self.endpoint.port == 0 {
            anyhow::bail!("RAFTA_PORT must be between 1 and 65535");
        }

        if self.username.is_empty() {
            anyhow::bail!("RAFTA_USER cannot be empty");
        }

        // Basic credentials use ':' as the separator
        if self.username.contains(':') {
            anyhow::bail!("RAFTA_USER cannot contain ':'");
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be at least 1 second");
        }

        Ok(())
    }
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
