use std::sync::Arc;

use serde::Serialize;
use turnstile::agents::AgentsClient;
use turnstile::models::tool::ToolDefinition;

/// Chat-facing description of one hosted agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub instructions: String,
    #[serde(skip)]
    pub tools: Vec<ToolDefinition>,
    pub has_tools: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agents: AgentsClient,
    pub profiles: Arc<Vec<AgentProfile>>,
    pub max_rounds: usize,
}

impl AppState {
    pub fn profile(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }
}

/// The agents this deployment hosts. The docs agent only exists when a tool
/// server is configured.
pub fn roster(mcp_url: Option<&str>) -> Vec<AgentProfile> {
    let mut profiles = vec![
        AgentProfile {
            name: "writer".to_string(),
            description: "Creates and edits content".to_string(),
            instructions: "You are an excellent content writer. You create new content and \
                edit content based on feedback. Format your responses in Markdown."
                .to_string(),
            tools: Vec::new(),
            has_tools: false,
        },
        AgentProfile {
            name: "reviewer".to_string(),
            description: "Reviews and provides feedback".to_string(),
            instructions: "You are an excellent content reviewer. Provide actionable feedback \
                in a constructive manner. Be specific about what works well and what could be \
                improved."
                .to_string(),
            tools: Vec::new(),
            has_tools: false,
        },
        AgentProfile {
            name: "code".to_string(),
            description: "Helps with coding questions".to_string(),
            instructions: "You are a helpful code assistant. You help with programming \
                questions, code review, debugging, and explaining code. Always use proper \
                Markdown code blocks with language identifiers."
                .to_string(),
            tools: Vec::new(),
            has_tools: false,
        },
    ];

    if let Some(url) = mcp_url {
        profiles.push(AgentProfile {
            name: "docs".to_string(),
            description: "Documentation assistant with remote tools".to_string(),
            instructions: "You are a helpful documentation assistant with access to a remote \
                documentation tool server. Use the tools it provides to answer questions with \
                up-to-date material, and cite the pages you used."
                .to_string(),
            tools: vec![ToolDefinition::mcp("docs", url)],
            has_tools: true,
        });
    }

    profiles
}
