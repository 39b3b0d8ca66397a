//! Network transport
//!
//! - `DirectTransport`: Path cascade (`/tools`, `/api/tools`, `/mcp/tools`)
//!   with a JSON-RPC fallback to the base URL
//! - `DelegatedAdapter`: Session library for SSE and streamable HTTP
//!   (`RmcpAdapter` by default)

mod direct;
mod delegated;
mod client;

pub use direct::{DirectTransport, CLIENT_USER_AGENT, SESSION_HEADER};
pub use delegated::{DelegatedAdapter, DelegatedSession, RmcpAdapter};
pub use client::NetworkClient;
