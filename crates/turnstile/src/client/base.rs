use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::ClientError;
use crate::models::request::ResponseRequest;
use crate::models::response::AgentResponse;

/// Incremental text deltas from a streaming response.
pub type TextDeltaStream = BoxStream<'static, Result<String, ClientError>>;

/// The platform's create-response operation for one agent.
///
/// Streaming is only for tool-free turns. Tool-bearing turns go through
/// `create_response` so the full output-item set, including any pending
/// approval requests, is visible at once.
#[async_trait]
pub trait ResponsesClient: Send + Sync {
    async fn create_response(
        &self,
        request: &ResponseRequest,
    ) -> Result<AgentResponse, ClientError>;

    async fn create_response_stream(
        &self,
        request: &ResponseRequest,
    ) -> Result<TextDeltaStream, ClientError>;
}
