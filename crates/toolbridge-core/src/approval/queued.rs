//! Channel-backed approval gate
//!
//! Requests are pushed to the host as [`PendingApproval`] items; the host
//! answers each one whenever it likes, from whatever UI it has.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::traits::{ApprovalGate, ApprovalRequest};

/// A request waiting for the host's decision
///
/// Dropping it unanswered disapproves the call.
#[derive(Debug)]
pub struct PendingApproval {
    pub request: ApprovalRequest,
    responder: oneshot::Sender<bool>,
}

impl PendingApproval {
    pub fn respond(self, approved: bool) {
        let _ = self.responder.send(approved);
    }

    pub fn approve(self) {
        self.respond(true);
    }

    pub fn reject(self) {
        self.respond(false);
    }
}

/// Forwards approval requests over an mpsc channel
#[derive(Debug, Clone)]
pub struct QueuedApprovalGate {
    sender: mpsc::Sender<PendingApproval>,
    timeout: Option<Duration>,
}

impl QueuedApprovalGate {
    /// Create a gate and the receiver the host reads requests from
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                timeout: None,
            },
            receiver,
        )
    }

    /// Disapprove requests left unanswered for `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ApprovalGate for QueuedApprovalGate {
    async fn request(&self, request: ApprovalRequest) -> bool {
        let (responder, decision) = oneshot::channel();
        if self
            .sender
            .send(PendingApproval { request, responder })
            .await
            .is_err()
        {
            return false;
        }

        match self.timeout {
            Some(timeout) => matches!(tokio::time::timeout(timeout, decision).await, Ok(Ok(true))),
            None => decision.await.unwrap_or(false),
        }
    }
}
