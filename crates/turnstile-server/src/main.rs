use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use turnstile::agents::{AgentDefinition, AgentLease, AgentsClient};

mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use state::{roster, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;
    let config = settings.platform.client_config()?;
    let agents = AgentsClient::new(config)?;

    let mut leases: Vec<AgentLease> = Vec::new();
    let result = run(&settings, agents, &mut leases).await;

    // Best-effort teardown of every created version, on success or failure.
    for lease in leases.drain(..) {
        lease.release().await;
    }
    result
}

async fn run(
    settings: &Settings,
    agents: AgentsClient,
    leases: &mut Vec<AgentLease>,
) -> Result<()> {
    let mut available = Vec::new();
    for profile in roster(settings.platform.mcp_url.as_deref()) {
        let mut definition = AgentDefinition::new(
            &profile.name,
            &settings.platform.model,
            &profile.instructions,
        );
        for tool in &profile.tools {
            definition = definition.with_tool(tool.clone());
        }

        match AgentLease::acquire(&agents, &definition).await {
            Ok(lease) => {
                leases.push(lease);
                available.push(profile);
            }
            // A tool agent that cannot be created is skipped; the rest of
            // the roster still serves.
            Err(error) if profile.has_tools => {
                warn!(agent = %profile.name, %error, "failed to create tool agent, skipping");
            }
            Err(error) => return Err(error.into()),
        }
    }
    info!("Initialized {} agents", available.len());

    let state = AppState {
        agents,
        profiles: Arc::new(available),
        max_rounds: settings.platform.max_rounds,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
