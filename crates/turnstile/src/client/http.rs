use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;

use super::base::{ResponsesClient, TextDeltaStream};
use super::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::request::ResponseRequest;
use crate::models::response::AgentResponse;

/// HTTP client for one agent's create-response operation.
pub struct HttpResponsesClient {
    client: Client,
    config: ClientConfig,
    agent: String,
}

impl HttpResponsesClient {
    pub fn new(config: ClientConfig, agent: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;
        Ok(Self::with_client(client, config, agent))
    }

    /// Reuse an existing connection pool, e.g. the one owned by the agents
    /// client.
    pub(crate) fn with_client(
        client: Client,
        config: ClientConfig,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            agent: agent.into(),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    fn url(&self) -> String {
        format!(
            "{}/agents/{}/responses",
            self.config.endpoint.as_str().trim_end_matches('/'),
            self.agent
        )
    }

    async fn post(&self, request: &ResponseRequest) -> Result<reqwest::Response, ClientError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.config.credential.bearer())
            .json(request)
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
        Ok(response)
    }
}

/// Extract the text delta from one server-sent event payload, if it carries
/// one.
fn delta_from_event(data: &str) -> Option<String> {
    if data == "[DONE]" {
        return None;
    }
    let event: Value = serde_json::from_str(data).ok()?;
    if event.get("type")?.as_str()? != "response.output_text.delta" {
        return None;
    }
    event.get("delta")?.as_str().map(String::from)
}

#[async_trait]
impl ResponsesClient for HttpResponsesClient {
    async fn create_response(
        &self,
        request: &ResponseRequest,
    ) -> Result<AgentResponse, ClientError> {
        let response = self.post(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn create_response_stream(
        &self,
        request: &ResponseRequest,
    ) -> Result<TextDeltaStream, ClientError> {
        let request = request.clone().streaming();
        let response = self.post(&request).await?;
        let mut body = response.bytes_stream();

        let stream = try_stream! {
            let mut buffer = String::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    if let Some(data) = line.strip_prefix("data:") {
                        if let Some(delta) = delta_from_event(data.trim()) {
                            yield delta;
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::config::Credential;
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HttpResponsesClient {
        let config =
            ClientConfig::new(&server.uri(), Credential::ApiKey("test-key".into())).unwrap();
        HttpResponsesClient::new(config, "writer").unwrap()
    }

    #[tokio::test]
    async fn create_response_parses_output_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agents/writer/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "resp-1",
                "output": [
                    {"type": "text", "text": "Hello"},
                    {
                        "type": "approval_request",
                        "id": "appr-1",
                        "server_label": "github",
                        "tool_name": "list_issues",
                        "arguments": {"repo": "x"}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response = client
            .create_response(&ResponseRequest::new().with_user_text("hi"))
            .await
            .unwrap();

        assert_eq!(response.id, "resp-1");
        assert_eq!(response.output_text(), "Hello");
        assert_eq!(response.approval_requests().count(), 1);
    }

    #[tokio::test]
    async fn non_success_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agents/writer/responses"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client
            .create_response(&ResponseRequest::new().with_user_text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ClientError::Api { status: 429, ref message } if message == "slow down"
        ));
    }

    #[tokio::test]
    async fn malformed_payload_maps_to_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agents/writer/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let error = client
            .create_response(&ResponseRequest::new().with_user_text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(error, ClientError::Payload(_)));
    }

    #[tokio::test]
    async fn streaming_request_sets_stream_flag_and_yields_deltas() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"lo\"}\n\n",
            "data: {\"type\":\"response.completed\"}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/agents/writer/responses"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let deltas: Vec<String> = client
            .create_response_stream(&ResponseRequest::new().with_user_text("hi"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[test]
    fn delta_parser_ignores_non_delta_events() {
        assert_eq!(
            delta_from_event(r#"{"type":"response.output_text.delta","delta":"x"}"#),
            Some("x".to_string())
        );
        assert_eq!(delta_from_event(r#"{"type":"response.completed"}"#), None);
        assert_eq!(delta_from_event("[DONE]"), None);
        assert_eq!(delta_from_event("not json"), None);
    }
}
