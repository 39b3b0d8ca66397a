//! Tool management module
//!
//! Tools come from three places: local handlers, subprocess connections and
//! network connections. The [`ToolRegistry`] merges them into one name-keyed
//! view and is the only place calls are dispatched from.
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌─────────────────┐
//! │ LocalTool    │   │ SubprocessStudio   │   │ NetworkStudio   │
//! └──────┬───────┘   └─────────┬──────────┘   └────────┬────────┘
//!        │ register            │ tools/list            │ tools/list
//!        ▼                     ▼                       ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │ ToolRegistry: resolve -> approval gate -> ToolInvoker         │
//! └───────────────────────────────────────────────────────────────┘
//! ```

mod invoker;
mod local;
mod builtin;
mod summary;
mod registry;

pub use invoker::{normalize_remote_result, RemoteInvoker, ToolError, ToolInvoker};
pub use local::LocalTool;
pub use builtin::{builtin_tools, Workspace};
pub use summary::{CategorySummary, ToolSummary};
pub use registry::{ResolvedTool, ToolFilter, ToolRegistry, DISAPPROVED};
