//! Approval gating for tool invocations.
//!
//! The gate itself never decides what is auto-approvable; that predicate
//! belongs to settings and tool policy. [`AutoApprovalGate`] wraps the
//! host's interactive gate and short-circuits only when the caller flagged
//! the request as unprotected.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Preview of a pending invocation shown to the user for a decision.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub tool_name: String,
    pub preview: Value,
    /// Attached screenshots or similar, forwarded opaquely to the UI.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Vec<u8>>,
    /// Destructive by policy; never auto-approved.
    pub protected: bool,
}

impl ApprovalRequest {
    pub fn new(tool_name: impl Into<String>, preview: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            preview,
            images: Vec::new(),
            protected: false,
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResponse {
    Yes,
    No,
    /// The user answered with a message instead of a plain yes/no.
    Message,
}

#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub response: ApprovalResponse,
    pub feedback_text: Option<String>,
    pub feedback_images: Vec<Vec<u8>>,
}

impl ApprovalDecision {
    pub fn yes() -> Self {
        Self {
            response: ApprovalResponse::Yes,
            feedback_text: None,
            feedback_images: Vec::new(),
        }
    }

    pub fn no() -> Self {
        Self {
            response: ApprovalResponse::No,
            feedback_text: None,
            feedback_images: Vec::new(),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            response: ApprovalResponse::Message,
            feedback_text: Some(text.into()),
            feedback_images: Vec::new(),
        }
    }

    pub fn with_feedback(mut self, text: impl Into<String>) -> Self {
        self.feedback_text = Some(text.into());
        self
    }

    pub fn approved(&self) -> bool {
        self.response == ApprovalResponse::Yes
    }
}

/// Host boundary: suspends the turn until the user (or policy) decides.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> anyhow::Result<ApprovalDecision>;
}

/// Unattended-mode wrapper. Approves immediately when enabled, except for
/// protected requests, which always reach the interactive gate.
pub struct AutoApprovalGate {
    inner: Arc<dyn ApprovalGate>,
    enabled: bool,
}

impl AutoApprovalGate {
    pub fn new(inner: Arc<dyn ApprovalGate>, enabled: bool) -> Self {
        Self { inner, enabled }
    }
}

#[async_trait]
impl ApprovalGate for AutoApprovalGate {
    async fn request_approval(&self, request: ApprovalRequest) -> anyhow::Result<ApprovalDecision> {
        if self.enabled && !request.protected {
            tracing::debug!(tool = %request.tool_name, "auto-approved");
            return Ok(ApprovalDecision::yes());
        }
        self.inner.request_approval(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DenyingGate {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApprovalGate for DenyingGate {
        async fn request_approval(
            &self,
            _request: ApprovalRequest,
        ) -> anyhow::Result<ApprovalDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApprovalDecision::no())
        }
    }

    #[tokio::test]
    async fn auto_mode_skips_the_inner_gate() {
        let inner = Arc::new(DenyingGate {
            calls: AtomicUsize::new(0),
        });
        let gate = AutoApprovalGate::new(inner.clone(), true);
        let decision = gate
            .request_approval(ApprovalRequest::new("read_file", json!({"path": "a"})))
            .await
            .expect("gate");
        assert!(decision.approved());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn protected_requests_always_reach_the_user() {
        let inner = Arc::new(DenyingGate {
            calls: AtomicUsize::new(0),
        });
        let gate = AutoApprovalGate::new(inner.clone(), true);
        let decision = gate
            .request_approval(
                ApprovalRequest::new("execute_command", json!({"command": "rm -rf build"}))
                    .protected(),
            )
            .await
            .expect("gate");
        assert!(!decision.approved());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interactive_mode_always_delegates() {
        let inner = Arc::new(DenyingGate {
            calls: AtomicUsize::new(0),
        });
        let gate = AutoApprovalGate::new(inner.clone(), false);
        let _ = gate
            .request_approval(ApprovalRequest::new("read_file", json!({})))
            .await
            .expect("gate");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
