use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::item::{ApprovalRequest, OutputItem};

fn default_created() -> i64 {
    Utc::now().timestamp()
}

/// One turn's worth of model output, addressable by id for continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: String,
    #[serde(default = "default_created")]
    pub created: i64,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

impl AgentResponse {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            created: default_created(),
            output: Vec::new(),
        }
    }

    pub fn with_output(mut self, item: OutputItem) -> Self {
        self.output.push(item);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_output(OutputItem::text(text))
    }

    pub fn with_approval_request(self, request: ApprovalRequest) -> Self {
        self.with_output(OutputItem::ApprovalRequest(request))
    }

    /// Plain-text rendering: all textual output items concatenated in order.
    pub fn output_text(&self) -> String {
        let mut text = String::new();
        for item in &self.output {
            if let Some(part) = item.as_text() {
                text.push_str(part);
            }
        }
        text
    }

    /// Pending tool-call approvals in this response, in output order.
    pub fn approval_requests(&self) -> impl Iterator<Item = &ApprovalRequest> {
        self.output.iter().filter_map(OutputItem::as_approval_request)
    }

    /// A response with no pending approvals ends the turn.
    pub fn is_terminal(&self) -> bool {
        self.approval_requests().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_text_concatenates_in_order() {
        let response = AgentResponse::new("resp-1")
            .with_text("Found 3 open issues: ")
            .with_approval_request(ApprovalRequest::new("appr-1", "github", "search", json!({})))
            .with_text("#1, #2, #3");
        assert_eq!(response.output_text(), "Found 3 open issues: #1, #2, #3");
    }

    #[test]
    fn empty_response_is_terminal_with_empty_text() {
        let response = AgentResponse::new("resp-2");
        assert!(response.is_terminal());
        assert_eq!(response.output_text(), "");
    }

    #[test]
    fn approval_requests_are_filtered_from_output() {
        let response = AgentResponse::new("resp-3")
            .with_approval_request(ApprovalRequest::new("a", "github", "search", json!({})))
            .with_text("working")
            .with_approval_request(ApprovalRequest::new("b", "github", "fetch", json!({})));
        let ids: Vec<&str> = response.approval_requests().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!response.is_terminal());
    }
}
