use axum::{extract::State, response::Json, routing::get, Router};

use crate::state::{AgentProfile, AppState};

async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentProfile>> {
    Json(state.profiles.as_ref().clone())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/agents", get(list_agents))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::roster;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;
    use turnstile::agents::AgentsClient;
    use turnstile::client::config::{ClientConfig, Credential};

    fn test_state() -> AppState {
        let config = ClientConfig::new(
            "https://project.example.com",
            Credential::ApiKey("test-key".into()),
        )
        .unwrap();
        AppState {
            agents: AgentsClient::new(config).unwrap(),
            profiles: Arc::new(roster(Some("https://mcp.example.com"))),
            max_rounds: 25,
        }
    }

    #[tokio::test]
    async fn lists_the_roster() {
        let app = routes(test_state());
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/agents")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let agents: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = agents
            .as_array()
            .unwrap()
            .iter()
            .map(|agent| agent["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["writer", "reviewer", "code", "docs"]);
    }
}
