// Auth service boundary

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};

use super::types::{BasicCredential, LoginResponse, TokenPair};
use crate::error::GatewayError;
use crate::http_client::method_url;

const LOGIN_METHOD: &str = "rafta.Auth/Login";
const REFRESH_METHOD: &str = "rafta.Auth/Refresh";

/// Remote endpoint that issues token pairs
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange primary credentials for a token pair. `Ok(None)` means the
    /// service answered without a pair.
    async fn login(
        &self,
        credential: &BasicCredential,
    ) -> Result<Option<TokenPair>, GatewayError>;

    /// Exchange a refresh token for a new pair
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, GatewayError>;
}

/// [`AuthGateway`] speaking JSON over HTTP
pub struct HttpAuthGateway {
    client: Client,
    base_url: String,
}

impl HttpAuthGateway {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn call(&self, method: &str, authorization: String) -> Result<Response, GatewayError> {
        let url = method_url(&self.base_url, method);
        tracing::debug!(url = %url, "Calling auth service");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(
        &self,
        credential: &BasicCredential,
    ) -> Result<Option<TokenPair>, GatewayError> {
        let response = self.call(LOGIN_METHOD, credential.header_value()).await?;
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(body.tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        let response = self
            .call(REFRESH_METHOD, format!("Bearer {}", refresh_token))
            .await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}
