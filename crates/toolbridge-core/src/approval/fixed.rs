//! Fixed-answer approval gate

use async_trait::async_trait;

use super::traits::{ApprovalGate, ApprovalRequest};

/// Approves or rejects everything
#[derive(Debug, Clone, Copy)]
pub struct StaticApprovalGate {
    approve: bool,
}

impl StaticApprovalGate {
    pub fn approve_all() -> Self {
        Self { approve: true }
    }

    pub fn reject_all() -> Self {
        Self { approve: false }
    }
}

#[async_trait]
impl ApprovalGate for StaticApprovalGate {
    async fn request(&self, _request: ApprovalRequest) -> bool {
        self.approve
    }
}
