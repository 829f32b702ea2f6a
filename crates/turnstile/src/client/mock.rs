use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use uuid::Uuid;

use super::base::{ResponsesClient, TextDeltaStream};
use crate::errors::ClientError;
use crate::models::request::ResponseRequest;
use crate::models::response::AgentResponse;

/// A scripted client for tests and offline development.
///
/// Serves a queue of pre-built replies and records every request it
/// receives, so callers can assert on continuation contents. Once the queue
/// drains it returns empty responses.
pub struct MockResponsesClient {
    replies: Mutex<VecDeque<Result<AgentResponse, ClientError>>>,
    repeated: Option<AgentResponse>,
    requests: Mutex<Vec<ResponseRequest>>,
}

impl MockResponsesClient {
    /// Serve the given responses in order.
    pub fn new(responses: Vec<AgentResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    /// Serve pre-built replies, including platform failures.
    pub fn from_results(replies: Vec<Result<AgentResponse, ClientError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeated: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve the same response on every call, simulating a platform that
    /// never reaches a terminal response.
    pub fn repeating(response: AgentResponse) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeated: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<ResponseRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<AgentResponse, ClientError> {
        if let Some(response) = &self.repeated {
            return Ok(response.clone());
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AgentResponse::new(format!("resp-{}", Uuid::new_v4()))))
    }
}

#[async_trait]
impl ResponsesClient for MockResponsesClient {
    async fn create_response(
        &self,
        request: &ResponseRequest,
    ) -> Result<AgentResponse, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_reply()
    }

    async fn create_response_stream(
        &self,
        request: &ResponseRequest,
    ) -> Result<TextDeltaStream, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self.next_reply()?;
        let deltas: Vec<Result<String, ClientError>> = response
            .output
            .iter()
            .filter_map(|item| item.as_text().map(|text| Ok(text.to_string())))
            .collect();
        Ok(Box::pin(stream::iter(deltas)))
    }
}
