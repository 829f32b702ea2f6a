use serde::{Deserialize, Serialize};

use super::item::InputItem;
use super::role::Role;
use super::tool::ToolDefinition;

/// An outbound unit of work: one call to the platform's create-response
/// operation.
///
/// A request carrying a `previous_response_id` is a continuation of that
/// exchange. The platform does not inherit instructions or tools across
/// responses, so continuations must restate both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub input: Vec<InputItem>,
    #[serde(default)]
    pub stream: bool,
}

impl ResponseRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// A follow-up request resuming the exchange after `previous_response_id`.
    pub fn continuation<S: Into<String>>(previous_response_id: S) -> Self {
        Self {
            previous_response_id: Some(previous_response_id.into()),
            ..Self::default()
        }
    }

    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_input(mut self, item: InputItem) -> Self {
        self.input.push(item);
        self
    }

    pub fn with_message<S: Into<String>>(self, role: Role, text: S) -> Self {
        self.with_input(InputItem::message(role, text))
    }

    pub fn with_user_text<S: Into<String>>(self, text: S) -> Self {
        self.with_input(InputItem::user(text))
    }

    pub fn with_assistant_text<S: Into<String>>(self, text: S) -> Self {
        self.with_input(InputItem::assistant(text))
    }

    pub fn with_approval<S: Into<String>>(self, approval_request_id: S, approved: bool) -> Self {
        self.with_input(InputItem::approval(approval_request_id, approved))
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Decisions carried by this request, in input order.
    pub fn approval_decisions(&self) -> impl Iterator<Item = (&str, bool)> {
        self.input.iter().filter_map(InputItem::as_approval)
    }
}
