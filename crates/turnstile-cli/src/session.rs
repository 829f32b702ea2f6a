use std::io::Write;

use anyhow::Result;
use console::style;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use turnstile::approval::{AlwaysApprove, ApprovalObserver, ApprovalPhase};
use turnstile::client::base::ResponsesClient;
use turnstile::client::http::HttpResponsesClient;
use turnstile::models::request::ResponseRequest;
use turnstile::models::tool::ToolDefinition;
use turnstile::turn::Turn;

/// The tool-bearing agent, present when a tool server is configured.
pub struct DocsAgent {
    pub client: HttpResponsesClient,
    pub tool: ToolDefinition,
    pub instructions: String,
}

pub struct Session {
    writer: HttpResponsesClient,
    reviewer: HttpResponsesClient,
    docs: Option<DocsAgent>,
    max_rounds: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum SessionInput {
    Prompt(String),
    Docs(String),
    Workflow,
    Exit,
}

fn parse_input(raw: &str) -> SessionInput {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return SessionInput::Exit;
    }
    if trimmed.eq_ignore_ascii_case("workflow") {
        return SessionInput::Workflow;
    }
    if let Some(rest) = trimmed.strip_prefix("docs:") {
        return SessionInput::Docs(rest.trim().to_string());
    }
    SessionInput::Prompt(trimmed.to_string())
}

/// Prints approval progress as the loop resolves tool calls.
struct ConsoleObserver;

impl ApprovalObserver for ConsoleObserver {
    fn on_approval(&self, server_label: &str, tool_name: &str, phase: ApprovalPhase) {
        let status = match phase {
            ApprovalPhase::Requested => "approval requested",
            ApprovalPhase::Approved => "approved",
            ApprovalPhase::Denied => "denied",
        };
        println!(
            "  {} {}: {}/{}",
            style("[mcp]").cyan(),
            status,
            server_label,
            tool_name
        );
    }
}

impl Session {
    pub fn new(
        writer: HttpResponsesClient,
        reviewer: HttpResponsesClient,
        docs: Option<DocsAgent>,
        max_rounds: usize,
    ) -> Self {
        Session {
            writer,
            reviewer,
            docs,
            max_rounds,
        }
    }

    pub async fn start(&self) -> Result<()> {
        loop {
            let raw: String = cliclack::input("Message:")
                .placeholder("")
                .multiline()
                .interact()?;

            match parse_input(&raw) {
                SessionInput::Exit => break,
                SessionInput::Prompt(text) if text.is_empty() => continue,
                SessionInput::Prompt(text) => {
                    self.stream_turn(&self.writer, &text).await;
                }
                SessionInput::Docs(text) => self.docs_turn(&text).await,
                SessionInput::Workflow => self.workflow_turn().await,
            }
            println!();
        }
        Ok(())
    }

    /// Stream a tool-free turn, printing deltas as they arrive. Returns the
    /// collected text so chained turns can reuse it.
    async fn stream_turn(&self, client: &HttpResponsesClient, prompt: &str) -> String {
        let request = ResponseRequest::new().with_user_text(prompt);
        let mut collected = String::new();

        match client.create_response_stream(&request).await {
            Ok(mut deltas) => {
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(text) => {
                            print!("{}", text);
                            let _ = std::io::stdout().flush();
                            collected.push_str(&text);
                        }
                        Err(error) => {
                            eprintln!("\nError: {}", error);
                            break;
                        }
                    }
                }
                println!();
            }
            Err(error) => eprintln!("Error: {}", error),
        }
        collected
    }

    /// Run a tool-bearing turn through the approval loop. Ctrl-C interrupts
    /// the turn without ending the session.
    async fn docs_turn(&self, prompt: &str) {
        let Some(docs) = &self.docs else {
            println!("No tool server configured; set TURNSTILE_MCP_URL or pass --mcp-url.");
            return;
        };

        let request = ResponseRequest::new()
            .with_instructions(docs.instructions.clone())
            .with_tool(docs.tool.clone())
            .with_user_text(prompt);

        let cancel = CancellationToken::new();
        let turn = Turn::new(&docs.client, &AlwaysApprove)
            .with_observer(&ConsoleObserver)
            .with_max_rounds(self.max_rounds);

        tokio::select! {
            result = turn.run_with_cancellation(request, &cancel) => match result {
                Ok(outcome) => render(&outcome.output_text()),
                Err(error) => eprintln!("Error: {}", error),
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                println!(
                    "\n{}",
                    style("Interrupted; dropped the in-flight turn.").dim()
                );
            }
        }
    }

    /// Writer drafts, reviewer critiques the draft.
    async fn workflow_turn(&self) {
        let topic: String = match cliclack::input("Workflow prompt:").placeholder("").interact() {
            Ok(topic) => topic,
            Err(error) => {
                eprintln!("Error: {}", error);
                return;
            }
        };

        println!("\n{}", style("=== writer ===").bold());
        let draft = self.stream_turn(&self.writer, &topic).await;
        if draft.is_empty() {
            return;
        }

        println!("\n{}", style("=== reviewer ===").bold());
        let review_prompt = format!(
            "Please review this content and provide feedback:\n\n{}",
            draft
        );
        self.stream_turn(&self.reviewer, &review_prompt).await;
    }
}

fn render(content: &str) {
    if content.is_empty() {
        println!("(no output)");
        return;
    }
    let printed = bat::PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}
