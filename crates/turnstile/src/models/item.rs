use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;

/// A pending, caller-resolvable decision gating one remote tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub server_label: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ApprovalRequest {
    pub fn new<I, S, T>(id: I, server_label: S, tool_name: T, arguments: Value) -> Self
    where
        I: Into<String>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            server_label: server_label.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content submitted to the platform as part of a response request
pub enum InputItem {
    Message {
        role: Role,
        text: String,
    },
    ApprovalDecision {
        approval_request_id: String,
        approved: bool,
    },
}

impl InputItem {
    pub fn message<S: Into<String>>(role: Role, text: S) -> Self {
        InputItem::Message {
            role,
            text: text.into(),
        }
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::message(Role::User, text)
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::message(Role::Assistant, text)
    }

    pub fn approval<S: Into<String>>(approval_request_id: S, approved: bool) -> Self {
        InputItem::ApprovalDecision {
            approval_request_id: approval_request_id.into(),
            approved,
        }
    }

    pub fn as_approval(&self) -> Option<(&str, bool)> {
        match self {
            InputItem::ApprovalDecision {
                approval_request_id,
                approved,
            } => Some((approval_request_id, *approved)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Content produced by the platform within a response. A closed union:
/// adding an item kind is a compile-visible change at every match site.
pub enum OutputItem {
    Text { text: String },
    ApprovalRequest(ApprovalRequest),
}

impl OutputItem {
    pub fn text<S: Into<String>>(text: S) -> Self {
        OutputItem::Text { text: text.into() }
    }

    /// Get the text if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutputItem::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_approval_request(&self) -> Option<&ApprovalRequest> {
        match self {
            OutputItem::ApprovalRequest(request) => Some(request),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_item_wire_tags() {
        let text: OutputItem = serde_json::from_value(json!({
            "type": "text",
            "text": "hello"
        }))
        .unwrap();
        assert_eq!(text.as_text(), Some("hello"));

        let approval: OutputItem = serde_json::from_value(json!({
            "type": "approval_request",
            "id": "appr-1",
            "server_label": "github",
            "tool_name": "list_issues",
            "arguments": {"repo": "x"}
        }))
        .unwrap();
        let request = approval.as_approval_request().unwrap();
        assert_eq!(request.id, "appr-1");
        assert_eq!(request.server_label, "github");
        assert_eq!(request.tool_name, "list_issues");
    }

    #[test]
    fn approval_decision_wire_shape() {
        let item = InputItem::approval("appr-1", false);
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "approval_decision",
                "approval_request_id": "appr-1",
                "approved": false
            })
        );
    }
}
