use std::env;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use turnstile::agents::{AgentDefinition, AgentLease, AgentsClient};
use turnstile::client::config::{ClientConfig, Credential};
use turnstile::models::tool::ToolDefinition;
use turnstile::turn::DEFAULT_MAX_ROUNDS;

mod session;

use session::{DocsAgent, Session};

const WRITER_INSTRUCTIONS: &str = "You are an excellent content writer. You create new content \
    and edit content based on feedback. Format your responses in Markdown.";

const REVIEWER_INSTRUCTIONS: &str = "You are an excellent content reviewer. Provide actionable \
    feedback in a constructive manner. Be specific about what works well and what could be \
    improved.";

const DOCS_INSTRUCTIONS: &str = "You are a helpful documentation assistant with access to a \
    remote documentation tool server. Use the tools it provides to answer questions with \
    up-to-date material, and cite the pages you used.";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Platform project endpoint (can also be set via TURNSTILE_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Developer API key (can also be set via TURNSTILE_API_KEY; the host's
    /// managed identity token is used when one is provided)
    #[arg(long)]
    api_key: Option<String>,

    /// Model deployment backing the created agents
    #[arg(short, long, default_value = "gpt-4o")]
    model: String,

    /// Remote MCP tool server for the docs agent (can also be set via
    /// TURNSTILE_MCP_URL)
    #[arg(long)]
    mcp_url: Option<String>,

    /// Maximum approval rounds per turn
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let endpoint = cli
        .endpoint
        .clone()
        .or_else(|| env::var("TURNSTILE_ENDPOINT").ok())
        .context("endpoint must be provided via --endpoint or TURNSTILE_ENDPOINT")?;
    let credential = match cli.api_key.clone() {
        Some(key) => Credential::ApiKey(key),
        None => Credential::from_env()?,
    };
    let config = ClientConfig::new(&endpoint, credential)?;
    let agents = AgentsClient::new(config)?;

    println!(
        "Turnstile {}",
        style("- type \"exit\" to end the session").dim()
    );
    println!();

    let mut leases: Vec<AgentLease> = Vec::new();
    let result = run(&cli, &agents, &mut leases).await;

    // Every created version is released here, whether the session ended
    // normally, failed, or was interrupted.
    for lease in leases.drain(..) {
        lease.release().await;
    }
    result
}

async fn run(cli: &Cli, agents: &AgentsClient, leases: &mut Vec<AgentLease>) -> Result<()> {
    let mcp_url = cli
        .mcp_url
        .clone()
        .or_else(|| env::var("TURNSTILE_MCP_URL").ok());

    let writer = AgentDefinition::new("writer", &cli.model, WRITER_INSTRUCTIONS);
    leases.push(AgentLease::acquire(agents, &writer).await?);
    println!("Created agent: {}", style("writer").green());

    let reviewer = AgentDefinition::new("reviewer", &cli.model, REVIEWER_INSTRUCTIONS);
    leases.push(AgentLease::acquire(agents, &reviewer).await?);
    println!("Created agent: {}", style("reviewer").green());

    let docs = match &mcp_url {
        Some(url) => {
            let tool = ToolDefinition::mcp("docs", url);
            let definition =
                AgentDefinition::new("docs", &cli.model, DOCS_INSTRUCTIONS).with_tool(tool.clone());
            leases.push(AgentLease::acquire(agents, &definition).await?);
            println!("Created agent: {} (remote tools)", style("docs").green());
            Some(DocsAgent {
                client: agents.responses_for("docs"),
                tool,
                instructions: DOCS_INSTRUCTIONS.to_string(),
            })
        }
        None => None,
    };
    println!();

    let session = Session::new(
        agents.responses_for("writer"),
        agents.responses_for("reviewer"),
        docs,
        cli.max_rounds,
    );
    session.start().await
}
