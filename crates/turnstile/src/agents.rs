use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::config::ClientConfig;
use crate::client::http::HttpResponsesClient;
use crate::errors::ClientError;
use crate::models::tool::ToolDefinition;

/// A named agent configuration to host on the platform.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    #[serde(skip)]
    pub name: String,
    pub model: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl AgentDefinition {
    pub fn new<N, M, I>(name: N, model: M, instructions: I) -> Self
    where
        N: Into<String>,
        M: Into<String>,
        I: Into<String>,
    {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }
}

/// A hosted agent version, addressable by name for responses and by
/// name+version for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVersion {
    pub name: String,
    pub version: String,
}

/// Platform operations for creating and deleting agent versions.
#[derive(Clone)]
pub struct AgentsClient {
    client: Client,
    config: ClientConfig,
}

impl AgentsClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    /// Responses client for one agent, sharing this client's connection
    /// pool.
    pub fn responses_for(&self, agent: &str) -> HttpResponsesClient {
        HttpResponsesClient::with_client(self.client.clone(), self.config.clone(), agent)
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_str().trim_end_matches('/')
    }

    pub async fn create_version(
        &self,
        definition: &AgentDefinition,
    ) -> Result<AgentVersion, ClientError> {
        let url = format!("{}/agents/{}/versions", self.endpoint(), definition.name);
        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.credential.bearer())
            .json(definition)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let version: AgentVersion = serde_json::from_str(&body)?;
        info!(agent = %version.name, version = %version.version, "created agent version");
        Ok(version)
    }

    pub async fn delete_version(&self, name: &str, version: &str) -> Result<(), ClientError> {
        let url = format!("{}/agents/{}/versions/{}", self.endpoint(), name, version);
        let response = self
            .client
            .delete(url)
            .bearer_auth(self.config.credential.bearer())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Scoped ownership of a created agent version.
///
/// Whoever creates a version owns its release. Release is best-effort:
/// failures are logged and never escalated, so cleanup cannot mask the error
/// that ended the session.
pub struct AgentLease {
    client: AgentsClient,
    version: Option<AgentVersion>,
}

impl AgentLease {
    pub async fn acquire(
        client: &AgentsClient,
        definition: &AgentDefinition,
    ) -> Result<Self, ClientError> {
        let version = client.create_version(definition).await?;
        Ok(Self {
            client: client.clone(),
            version: Some(version),
        })
    }

    pub fn agent_name(&self) -> &str {
        self.version
            .as_ref()
            .map(|version| version.name.as_str())
            .unwrap_or_default()
    }

    /// Delete the version. Runs on every exit path of a well-behaved caller,
    /// whether the session ended normally, failed, or was interrupted.
    pub async fn release(mut self) {
        if let Some(version) = self.version.take() {
            match self
                .client
                .delete_version(&version.name, &version.version)
                .await
            {
                Ok(()) => info!(agent = %version.name, "deleted agent version"),
                Err(error) => {
                    warn!(agent = %version.name, %error, "failed to delete agent version")
                }
            }
        }
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        if let Some(version) = &self.version {
            warn!(
                agent = %version.name,
                version = %version.version,
                "agent version dropped without release"
            );
        }
    }
}
