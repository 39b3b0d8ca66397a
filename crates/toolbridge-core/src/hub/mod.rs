//! Orchestration context
//!
//! A [`ToolHub`] ties the two studios to one registry. It is built
//! explicitly and shared as `Arc<ToolHub>`; there is no process-wide
//! instance.

mod error;
mod context;

pub use error::{HubError, HubResult};
pub use context::{StartReport, ToolHub};
