//! Approval gating for tool calls

mod traits;
mod console;
mod fixed;
mod queued;

pub use traits::{ApprovalGate, ApprovalRequest};
pub use console::ConsoleApprovalGate;
pub use fixed::StaticApprovalGate;
pub use queued::{PendingApproval, QueuedApprovalGate};
