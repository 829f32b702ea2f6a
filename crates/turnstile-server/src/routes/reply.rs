use crate::state::{AgentProfile, AppState};
use axum::{
    extract::State,
    http::{self, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use turnstile::approval::{AlwaysApprove, ApprovalObserver, ApprovalPhase};
use turnstile::client::base::ResponsesClient;
use turnstile::client::http::HttpResponsesClient;
use turnstile::models::request::ResponseRequest;
use turnstile::models::role::Role;
use turnstile::turn::Turn;

/// Trailing history messages forwarded to the platform per turn.
const HISTORY_WINDOW: usize = 20;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    agent: String,
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: String,
    content: String,
}

// Chunked data-stream response: text deltas, tool notices, and a finish
// frame.
pub struct StreamResponse {
    rx: UnboundedReceiverStream<String>,
}

impl StreamResponse {
    fn new(rx: UnboundedReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for StreamResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for StreamResponse {
    fn into_response(self) -> axum::response::Response {
        let stream = self;
        let body = axum::body::Body::from_stream(stream);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::new());
        format!("0:{}\n", encoded_text)
    }

    fn format_tool_notice(server_label: &str, tool_name: &str, status: &str) -> String {
        // Tool notices start with "9:"
        let notice = json!({
            "serverLabel": server_label,
            "toolName": tool_name,
            "status": status
        });
        format!("9:{}\n", notice)
    }

    fn format_finish(reason: &str) -> String {
        // Finish messages start with "d:"
        let finish = json!({ "finishReason": reason });
        format!("d:{}\n", finish)
    }
}

/// Forwards approval phases into the response stream so the client sees
/// tool progress before the terminal text arrives.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<String>,
}

impl ApprovalObserver for ChannelObserver {
    fn on_approval(&self, server_label: &str, tool_name: &str, phase: ApprovalPhase) {
        let status = match phase {
            ApprovalPhase::Requested => "approval_requested",
            ApprovalPhase::Approved => "approved",
            ApprovalPhase::Denied => "denied",
        };
        let _ = self.tx.send(ProtocolFormatter::format_tool_notice(
            server_label,
            tool_name,
            status,
        ));
    }
}

/// Convert the windowed chat history into one platform request carrying the
/// agent's instructions and tools.
fn build_request(profile: &AgentProfile, messages: &[IncomingMessage]) -> ResponseRequest {
    let mut request = ResponseRequest::new()
        .with_instructions(profile.instructions.clone())
        .with_tools(profile.tools.clone());

    let window = messages.len().saturating_sub(HISTORY_WINDOW);
    for message in &messages[window..] {
        let role = match message.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => {
                tracing::warn!("Unknown role: {}", other);
                continue;
            }
        };
        request = request.with_message(role, message.content.clone());
    }
    request
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<StreamResponse, StatusCode> {
    let Some(profile) = state.profile(&request.agent).cloned() else {
        return Err(StatusCode::NOT_FOUND);
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let stream = UnboundedReceiverStream::new(rx);

    let client = state.agents.responses_for(&profile.name);
    let max_rounds = state.max_rounds;
    let outbound = build_request(&profile, &request.messages);

    tokio::spawn(async move {
        if profile.has_tools {
            run_approval_turn(client, outbound, max_rounds, tx).await;
        } else {
            stream_deltas(client, outbound, tx).await;
        }
    });

    Ok(StreamResponse::new(stream))
}

/// Tool-bearing agents use the non-streaming call so every pending approval
/// is visible at once; the observer surfaces progress frames instead.
async fn run_approval_turn(
    client: HttpResponsesClient,
    request: ResponseRequest,
    max_rounds: usize,
    tx: mpsc::UnboundedSender<String>,
) {
    let observer = ChannelObserver { tx: tx.clone() };
    let turn = Turn::new(&client, &AlwaysApprove)
        .with_observer(&observer)
        .with_max_rounds(max_rounds);

    match turn.run(request).await {
        Ok(outcome) => {
            let text = outcome.output_text();
            for line in text.lines() {
                let _ = tx.send(ProtocolFormatter::format_text(&format!("{}\n", line)));
            }
            let _ = tx.send(ProtocolFormatter::format_finish("stop"));
        }
        Err(error) => {
            tracing::error!("Turn failed: {}", error);
            let _ = tx.send(ProtocolFormatter::format_text(&format!(
                "Error: {}\n",
                error
            )));
            let _ = tx.send(ProtocolFormatter::format_finish("error"));
        }
    }
}

async fn stream_deltas(
    client: HttpResponsesClient,
    request: ResponseRequest,
    tx: mpsc::UnboundedSender<String>,
) {
    match client.create_response_stream(&request).await {
        Ok(mut deltas) => {
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(text) => {
                        // A closed channel means the client disconnected.
                        if tx.send(ProtocolFormatter::format_text(&text)).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::error!("Error streaming response: {}", error);
                        let _ = tx.send(ProtocolFormatter::format_finish("error"));
                        return;
                    }
                }
            }
            let _ = tx.send(ProtocolFormatter::format_finish("stop"));
        }
        Err(error) => {
            tracing::error!("Failed to start response stream: {}", error);
            let _ = tx.send(ProtocolFormatter::format_text(&format!(
                "Error: {}\n",
                error
            )));
            let _ = tx.send(ProtocolFormatter::format_finish("error"));
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(handler))
        .with_state(state)
}
