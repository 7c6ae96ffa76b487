// Shared HTTP plumbing for the auth and domain clients

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1157;

/// Address of the Rafta server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Plaintext HTTP instead of TLS
    pub insecure: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            insecure: false,
        }
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, insecure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            insecure,
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.insecure { "http" } else { "https" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// URL of a remote method, e.g. `rafta.Auth/Login`
pub fn method_url(base_url: &str, method: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), method)
}

/// Build the HTTP client shared by every remote call
pub fn build_client(connect_timeout: u64, request_timeout: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(request_timeout))
        .build()
        .context("Failed to create HTTP client")
}
