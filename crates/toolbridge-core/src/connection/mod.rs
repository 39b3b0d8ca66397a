//! Tool connection abstractions
//!
//! Every transport implements [`ToolConnection`]; studios own connections and
//! drive their lifecycle, the registry only routes calls to them.

mod error;
mod state;
mod traits;

pub use error::{ConnectionError, ConnectionResult};
pub use state::{ConnectionState, InitGuard, StateCell};
pub use traits::{ManagedConnection, ToolConnection};
