use serde::{Deserialize, Serialize};

/// Whether the platform must ask before invoking a tool on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// A tool made available to a hosted agent
pub enum ToolDefinition {
    Mcp {
        server_label: String,
        server_url: String,
        require_approval: ApprovalMode,
    },
}

impl ToolDefinition {
    /// Remote MCP tool server with every invocation gated on approval.
    pub fn mcp<L, U>(server_label: L, server_url: U) -> Self
    where
        L: Into<String>,
        U: Into<String>,
    {
        ToolDefinition::Mcp {
            server_label: server_label.into(),
            server_url: server_url.into(),
            require_approval: ApprovalMode::Always,
        }
    }

    pub fn server_label(&self) -> &str {
        match self {
            ToolDefinition::Mcp { server_label, .. } => server_label,
        }
    }
}
