// Authenticated calls to the Rafta task service
//
// Payloads are forwarded as JSON without interpretation.

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::{json, Value};

use crate::auth::CredentialManager;
use crate::error::{ClientError, Result};
use crate::http_client::method_url;

const SERVICE: &str = "rafta.Rafta";

/// Client for the task/user operations of a Rafta server
pub struct RaftaClient {
    client: Client,
    base_url: String,
    credentials: CredentialManager,
}

impl RaftaClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: CredentialManager,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub async fn get_all_tasks(&self) -> Result<Value> {
        self.call("GetAllTasks", json!({})).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Value> {
        self.call("GetTask", json!({ "value": id })).await
    }

    pub async fn get_user_info(&self) -> Result<Value> {
        self.call("GetUserInfo", json!({})).await
    }

    pub async fn delete_user(&self) -> Result<Value> {
        self.call("DeleteUser", json!({})).await
    }

    /// Change the account's credentials. Cached tokens stay in use; the
    /// credential manager keeps logging in with the credentials it was built
    /// with once they run out.
    pub async fn update_credentials(&self, request: Value) -> Result<Value> {
        self.call("UpdateCredentials", request).await
    }

    pub async fn update_user_info(&self, user: Value) -> Result<Value> {
        self.call("UpdateUserInfo", user).await
    }

    pub async fn new_task(&self, task: Value) -> Result<Value> {
        self.call("NewTask", task).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<Value> {
        self.call("DeleteTask", json!({ "value": id })).await
    }

    pub async fn update_task(&self, request: Value) -> Result<Value> {
        self.call("UpdateTask", request).await
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value> {
        let token = self.credentials.bearer_token().await?;
        let url = method_url(&self.base_url, &format!("{}/{}", SERVICE, method));

        tracing::debug!(method = %method, url = %url, "Calling Rafta service");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(method = %method, status = %status, "Rafta call failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        // Empty replies (deletes) come back as null
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
