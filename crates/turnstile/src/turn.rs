use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::approval::{ApprovalObserver, ApprovalPhase, ApprovalPolicy, NullObserver};
use crate::client::base::ResponsesClient;
use crate::errors::TurnError;
use crate::models::request::ResponseRequest;
use crate::models::response::AgentResponse;

/// Default cap on platform calls within one turn.
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Drives one logical user turn to completion, transparently resolving
/// rounds of remote tool-call approval until the platform produces a
/// response with no pending requests.
///
/// The loop is strictly sequential: each continuation depends on the
/// previous response's id, so there is nothing to parallelize within a
/// turn. Separate turns share no state and may run concurrently.
pub struct Turn<'a> {
    client: &'a dyn ResponsesClient,
    policy: &'a dyn ApprovalPolicy,
    observer: &'a dyn ApprovalObserver,
    max_rounds: usize,
}

/// Terminal result of a turn: the final response and how many platform
/// calls it took.
#[derive(Debug)]
pub struct TurnOutcome {
    pub response: AgentResponse,
    pub rounds: usize,
}

impl TurnOutcome {
    pub fn output_text(&self) -> String {
        self.response.output_text()
    }
}

impl<'a> Turn<'a> {
    pub fn new(client: &'a dyn ResponsesClient, policy: &'a dyn ApprovalPolicy) -> Self {
        Self {
            client,
            policy,
            observer: &NullObserver,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ApprovalObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Run the turn without external cancellation.
    pub async fn run(&self, request: ResponseRequest) -> Result<TurnOutcome, TurnError> {
        self.run_with_cancellation(request, &CancellationToken::new())
            .await
    }

    /// Run the turn, exiting cleanly when `cancel` fires.
    ///
    /// Cancellation is honored before each platform call and while one is in
    /// flight; once the token fires no further continuation is issued, so no
    /// approval decision is ever silently dropped mid-batch.
    pub async fn run_with_cancellation(
        &self,
        request: ResponseRequest,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        // Continuations must restate these; the platform does not carry
        // instructions or tools forward across responses.
        let instructions = request.instructions.clone();
        let tools = request.tools.clone();

        let mut outbound = request;
        let mut rounds = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TurnError::Cancelled);
            }
            if rounds == self.max_rounds {
                return Err(TurnError::RoundLimitExceeded {
                    limit: self.max_rounds,
                });
            }
            rounds += 1;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TurnError::Cancelled),
                result = self.client.create_response(&outbound) => result?,
            };

            // Every pending approval in the response is resolved in one
            // continuation batch, not just the first.
            let pending: Vec<_> = response.approval_requests().cloned().collect();
            if pending.is_empty() {
                return Ok(TurnOutcome { response, rounds });
            }

            let mut next =
                ResponseRequest::continuation(&response.id).with_tools(tools.clone());
            if let Some(instructions) = &instructions {
                next = next.with_instructions(instructions.clone());
            }

            for request in &pending {
                self.observer.on_approval(
                    &request.server_label,
                    &request.tool_name,
                    ApprovalPhase::Requested,
                );
                let approved = match self.policy.decide(request).await {
                    Ok(approved) => approved,
                    Err(error) => {
                        warn!(
                            server = %request.server_label,
                            tool = %request.tool_name,
                            %error,
                            "approval policy failed, denying tool call"
                        );
                        false
                    }
                };
                let phase = if approved {
                    ApprovalPhase::Approved
                } else {
                    ApprovalPhase::Denied
                };
                self.observer
                    .on_approval(&request.server_label, &request.tool_name, phase);
                next = next.with_approval(&request.id, approved);
            }

            outbound = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::approval::{AlwaysApprove, ApprovalObserver, ApprovalPhase, ApprovalPolicy};
    use crate::client::mock::MockResponsesClient;
    use crate::errors::ClientError;
    use crate::models::item::ApprovalRequest;
    use crate::models::tool::ToolDefinition;

    struct DenyAll;

    #[async_trait]
    impl ApprovalPolicy for DenyAll {
        async fn decide(&self, _request: &ApprovalRequest) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    struct FailingPolicy;

    #[async_trait]
    impl ApprovalPolicy for FailingPolicy {
        async fn decide(&self, _request: &ApprovalRequest) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("policy backend offline"))
        }
    }

    struct CancellingPolicy {
        token: CancellationToken,
    }

    #[async_trait]
    impl ApprovalPolicy for CancellingPolicy {
        async fn decide(&self, _request: &ApprovalRequest) -> anyhow::Result<bool> {
            self.token.cancel();
            Ok(true)
        }
    }

    #[derive(Default)]
    struct CollectingObserver {
        events: Mutex<Vec<(String, String, ApprovalPhase)>>,
    }

    impl CollectingObserver {
        fn events(&self) -> Vec<(String, String, ApprovalPhase)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ApprovalObserver for CollectingObserver {
        fn on_approval(&self, server_label: &str, tool_name: &str, phase: ApprovalPhase) {
            self.events.lock().unwrap().push((
                server_label.to_string(),
                tool_name.to_string(),
                phase,
            ));
        }
    }

    fn approval(id: &str, server: &str, tool: &str) -> ApprovalRequest {
        ApprovalRequest::new(id, server, tool, json!({}))
    }

    #[tokio::test]
    async fn resolves_single_approval_round() {
        let client = MockResponsesClient::new(vec![
            AgentResponse::new("resp-1")
                .with_approval_request(approval("appr-1", "github", "list_issues")),
            AgentResponse::new("resp-2").with_text("Found 3 open issues: #1, #2, #3"),
        ]);
        let observer = CollectingObserver::default();

        let outcome = Turn::new(&client, &AlwaysApprove)
            .with_observer(&observer)
            .run(ResponseRequest::new().with_user_text("List open issues in repo X"))
            .await
            .unwrap();

        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.output_text(), "Found 3 open issues: #1, #2, #3");
        assert_eq!(client.requests().len(), 2);
        assert_eq!(
            observer.events(),
            vec![
                (
                    "github".to_string(),
                    "list_issues".to_string(),
                    ApprovalPhase::Requested
                ),
                (
                    "github".to_string(),
                    "list_issues".to_string(),
                    ApprovalPhase::Approved
                ),
            ]
        );
    }

    #[tokio::test]
    async fn round_cap_stops_endless_approvals() {
        let client = MockResponsesClient::repeating(
            AgentResponse::new("resp-loop")
                .with_approval_request(approval("appr-loop", "github", "search")),
        );

        let error = Turn::new(&client, &AlwaysApprove)
            .with_max_rounds(3)
            .run(ResponseRequest::new().with_user_text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            TurnError::RoundLimitExceeded { limit: 3 }
        ));
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn resolves_all_approvals_in_one_batch() {
        let client = MockResponsesClient::new(vec![
            AgentResponse::new("resp-1")
                .with_approval_request(approval("appr-1", "github", "list_issues"))
                .with_approval_request(approval("appr-2", "github", "search_code")),
            AgentResponse::new("resp-2").with_text("done"),
        ]);

        Turn::new(&client, &AlwaysApprove)
            .run(ResponseRequest::new().with_user_text("go"))
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        let decisions: Vec<_> = requests[1].approval_decisions().collect();
        assert_eq!(decisions, vec![("appr-1", true), ("appr-2", true)]);
        assert_eq!(
            requests[1].previous_response_id.as_deref(),
            Some("resp-1")
        );
    }

    #[tokio::test]
    async fn continuations_carry_instructions_and_tools() {
        let tool = ToolDefinition::mcp("github", "https://mcp.example.com");
        let client = MockResponsesClient::new(vec![
            AgentResponse::new("resp-1")
                .with_approval_request(approval("appr-1", "github", "search")),
            AgentResponse::new("resp-2")
                .with_approval_request(approval("appr-2", "github", "fetch")),
            AgentResponse::new("resp-3").with_text("done"),
        ]);

        let initial = ResponseRequest::new()
            .with_instructions("You are a helpful assistant.")
            .with_tool(tool.clone())
            .with_user_text("go");

        let outcome = Turn::new(&client, &AlwaysApprove).run(initial).await.unwrap();
        assert_eq!(outcome.rounds, 3);

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(
                request.instructions.as_deref(),
                Some("You are a helpful assistant.")
            );
            assert_eq!(request.tools, vec![tool.clone()]);
        }
        assert_eq!(requests[1].previous_response_id.as_deref(), Some("resp-1"));
        assert_eq!(requests[2].previous_response_id.as_deref(), Some("resp-2"));
    }

    #[tokio::test]
    async fn denial_is_submitted_not_skipped() {
        let client = MockResponsesClient::new(vec![
            AgentResponse::new("resp-1")
                .with_approval_request(approval("appr-1", "filesystem", "delete_file")),
            AgentResponse::new("resp-2").with_text("I could not run that tool."),
        ]);
        let observer = CollectingObserver::default();

        let outcome = Turn::new(&client, &DenyAll)
            .with_observer(&observer)
            .run(ResponseRequest::new().with_user_text("clean up"))
            .await
            .unwrap();

        assert_eq!(outcome.rounds, 2);
        let requests = client.requests();
        let decisions: Vec<_> = requests[1].approval_decisions().collect();
        assert_eq!(decisions, vec![("appr-1", false)]);
        assert_eq!(observer.events()[1].2, ApprovalPhase::Denied);
    }

    #[tokio::test]
    async fn empty_terminal_response_is_not_an_error() {
        let client = MockResponsesClient::new(vec![]);

        let outcome = Turn::new(&client, &AlwaysApprove)
            .run(ResponseRequest::new().with_user_text("hello"))
            .await
            .unwrap();

        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.output_text(), "");
    }

    #[tokio::test]
    async fn policy_failure_is_treated_as_denial() {
        let client = MockResponsesClient::new(vec![
            AgentResponse::new("resp-1")
                .with_approval_request(approval("appr-1", "github", "search")),
            AgentResponse::new("resp-2").with_text("done"),
        ]);

        let outcome = Turn::new(&client, &FailingPolicy)
            .run(ResponseRequest::new().with_user_text("go"))
            .await
            .unwrap();

        assert_eq!(outcome.output_text(), "done");
        let requests = client.requests();
        let decisions: Vec<_> = requests[1].approval_decisions().collect();
        assert_eq!(decisions, vec![("appr-1", false)]);
    }

    #[tokio::test]
    async fn platform_error_propagates() {
        let client = MockResponsesClient::from_results(vec![Err(ClientError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        })]);

        let error = Turn::new(&client, &AlwaysApprove)
            .run(ResponseRequest::new().with_user_text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            TurnError::Client(ClientError::Api { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_before_first_call() {
        let client = MockResponsesClient::new(vec![AgentResponse::new("resp-1")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = Turn::new(&client, &AlwaysApprove)
            .run_with_cancellation(ResponseRequest::new().with_user_text("hi"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(error, TurnError::Cancelled));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_turn_issues_no_continuation() {
        let cancel = CancellationToken::new();
        let client = MockResponsesClient::new(vec![
            AgentResponse::new("resp-1")
                .with_approval_request(approval("appr-1", "github", "search")),
            AgentResponse::new("resp-2").with_text("done"),
        ]);
        let policy = CancellingPolicy {
            token: cancel.clone(),
        };

        let error = Turn::new(&client, &policy)
            .run_with_cancellation(ResponseRequest::new().with_user_text("hi"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(error, TurnError::Cancelled));
        assert_eq!(client.requests().len(), 1);
    }
}
