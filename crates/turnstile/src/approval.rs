use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::item::ApprovalRequest;

/// Decides whether a pending tool invocation may proceed.
///
/// The loop treats a policy error as a denial for that one call; an error
/// never aborts the surrounding turn.
#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn decide(&self, request: &ApprovalRequest) -> anyhow::Result<bool>;
}

/// Approves every tool call.
pub struct AlwaysApprove;

#[async_trait]
impl ApprovalPolicy for AlwaysApprove {
    async fn decide(&self, _request: &ApprovalRequest) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Approves calls only from tool servers on the allow list.
pub struct ServerAllowList {
    allowed: HashSet<String>,
}

impl ServerAllowList {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: labels.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ApprovalPolicy for ServerAllowList {
    async fn decide(&self, request: &ApprovalRequest) -> anyhow::Result<bool> {
        Ok(self.allowed.contains(&request.server_label))
    }
}

/// Lifecycle points of one approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPhase {
    Requested,
    Approved,
    Denied,
}

/// Receives approval lifecycle events as the loop resolves them, so a UI can
/// surface progress before the terminal response arrives. Purely
/// observational; the loop's result does not depend on it.
pub trait ApprovalObserver: Send + Sync {
    fn on_approval(&self, server_label: &str, tool_name: &str, phase: ApprovalPhase);
}

/// Discards every event.
pub struct NullObserver;

impl ApprovalObserver for NullObserver {
    fn on_approval(&self, _server_label: &str, _tool_name: &str, _phase: ApprovalPhase) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(server: &str) -> ApprovalRequest {
        ApprovalRequest::new("appr-1", server, "search", json!({}))
    }

    #[tokio::test]
    async fn always_approve_approves() {
        assert!(AlwaysApprove.decide(&request("github")).await.unwrap());
    }

    #[tokio::test]
    async fn allow_list_checks_server_label() {
        let policy = ServerAllowList::new(["github", "mslearn"]);
        assert!(policy.decide(&request("github")).await.unwrap());
        assert!(!policy.decide(&request("filesystem")).await.unwrap());
    }
}
